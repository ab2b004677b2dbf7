//! Role → actor resolution. A small interpreter over a closed strategy set,
//! composed with a fallback-policy function, so the matching logic stays
//! testable independent of persistence. Failures are loud: a silently wrong
//! approver is worse than a blocked submission.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::org::{EmployeeProfile, OrgUnitId, UserAccount, UserId};

/// Role whose members form the fixed actor pool for FIXED_USER resolution
/// and for the HR_ADMIN / SKIP fallbacks.
pub const ADMIN_ROLE_CODE: &str = "admin";

/// Role code a ROLE_BASED template step resolves against when it carries none.
pub const DEFAULT_STEP_ROLE: &str = "HR_ADMIN";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    OrgChain,
    JobPosition,
    FixedUser,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackPolicy {
    Escalate,
    HrAdmin,
    Skip,
}

impl FallbackPolicy {
    /// The source system redirects both HR_ADMIN and SKIP to the admin pool
    /// rather than omitting the step. Kept in one place so a true skip is a
    /// one-line change once the intended semantics are confirmed.
    pub fn redirects_to_admin_pool(self) -> bool {
        matches!(self, Self::HrAdmin | Self::Skip)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorResolutionRule {
    pub role_code: String,
    pub method: ResolutionMethod,
    pub keywords: Vec<String>,
    pub fallback: FallbackPolicy,
    pub active: bool,
}

/// A concrete person plus the identity fields frozen into a step snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedActor {
    pub user_id: UserId,
    pub display_name: String,
    pub org_unit_id: Option<OrgUnitId>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no user holds the `admin` role; the fixed actor pool is empty")]
    EmptyAdminPool,
    #[error("no actor matched role `{role_code}` with keywords {keywords:?}")]
    NoMatch { role_code: String, keywords: Vec<String> },
    #[error("directory lookup failed: {0}")]
    Directory(String),
}

/// Read-only organizational lookups consumed by resolution. Implementations
/// must return role memberships in ascending user-id order.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user_account(&self, user_id: &UserId) -> Result<Option<UserAccount>, String>;
    async fn employee_profile(&self, user_id: &UserId) -> Result<Option<EmployeeProfile>, String>;
    async fn active_members_of_unit(
        &self,
        unit: &OrgUnitId,
    ) -> Result<Vec<EmployeeProfile>, String>;
    async fn active_employees(&self) -> Result<Vec<EmployeeProfile>, String>;
    async fn users_with_role(&self, role_code: &str) -> Result<Vec<UserId>, String>;
}

/// Splits the stored comma-separated keyword column into match terms.
pub fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Case-insensitive substring OR-match of keywords over a position title.
pub fn title_matches(keywords: &[String], title: &str) -> bool {
    let title = title.to_lowercase();
    keywords.iter().any(|keyword| title.contains(&keyword.to_lowercase()))
}

pub struct ActorResolver<'a, D> {
    directory: &'a D,
}

impl<'a, D> ActorResolver<'a, D>
where
    D: Directory,
{
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    pub async fn resolve(
        &self,
        requester: &UserId,
        rule: &ActorResolutionRule,
    ) -> Result<ResolvedActor, ResolutionError> {
        if rule.method == ResolutionMethod::FixedUser {
            return self.admin_pool_actor().await;
        }

        let profile = self
            .directory
            .employee_profile(requester)
            .await
            .map_err(ResolutionError::Directory)?;
        let Some(profile) = profile else {
            return self.apply_fallback(rule).await;
        };

        if rule.keywords.is_empty() {
            return self.apply_fallback(rule).await;
        }

        let candidates = if rule.method == ResolutionMethod::OrgChain {
            match &profile.org_unit_id {
                Some(unit) => self
                    .directory
                    .active_members_of_unit(unit)
                    .await
                    .map_err(ResolutionError::Directory)?,
                None => return self.apply_fallback(rule).await,
            }
        } else {
            self.directory.active_employees().await.map_err(ResolutionError::Directory)?
        };

        let mut matched: Vec<&EmployeeProfile> = candidates
            .iter()
            .filter(|candidate| candidate.status.is_active())
            .filter(|candidate| title_matches(&rule.keywords, &candidate.position_title))
            .collect();
        matched.sort_by(|left, right| left.user_id.cmp(&right.user_id));

        match matched.first() {
            Some(hit) => self.materialize(&hit.user_id).await,
            None => self.apply_fallback(rule).await,
        }
    }

    /// Lowest user id holding the admin role. Deterministic by contract;
    /// an empty pool is a loud failure, never a silent skip.
    pub async fn admin_pool_actor(&self) -> Result<ResolvedActor, ResolutionError> {
        let pool = self
            .directory
            .users_with_role(ADMIN_ROLE_CODE)
            .await
            .map_err(ResolutionError::Directory)?;
        match pool.first() {
            Some(user_id) => self.materialize(user_id).await,
            None => Err(ResolutionError::EmptyAdminPool),
        }
    }

    async fn apply_fallback(
        &self,
        rule: &ActorResolutionRule,
    ) -> Result<ResolvedActor, ResolutionError> {
        if rule.fallback.redirects_to_admin_pool() {
            return self.admin_pool_actor().await;
        }

        Err(ResolutionError::NoMatch {
            role_code: rule.role_code.clone(),
            keywords: rule.keywords.clone(),
        })
    }

    /// Freezes display name and org unit for the resolved user. A missing
    /// account falls back to the raw id so snapshots always carry a name.
    pub async fn materialize(&self, user_id: &UserId) -> Result<ResolvedActor, ResolutionError> {
        let account = self
            .directory
            .user_account(user_id)
            .await
            .map_err(ResolutionError::Directory)?;
        let profile = self
            .directory
            .employee_profile(user_id)
            .await
            .map_err(ResolutionError::Directory)?;

        Ok(ResolvedActor {
            user_id: user_id.clone(),
            display_name: account
                .map(|account| account.display_name)
                .unwrap_or_else(|| user_id.0.clone()),
            org_unit_id: profile.and_then(|profile| profile.org_unit_id),
        })
    }
}

/// In-memory directory for tests of resolution and snapshot building.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    pub accounts: Vec<UserAccount>,
    pub profiles: Vec<EmployeeProfile>,
    pub role_members: Vec<(String, UserId)>,
}

impl InMemoryDirectory {
    pub fn with_admin_pool(mut self, user_ids: Vec<&str>) -> Self {
        for user_id in user_ids {
            self.role_members.push((ADMIN_ROLE_CODE.to_string(), UserId(user_id.to_string())));
        }
        self
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn user_account(&self, user_id: &UserId) -> Result<Option<UserAccount>, String> {
        Ok(self.accounts.iter().find(|account| &account.id == user_id).cloned())
    }

    async fn employee_profile(&self, user_id: &UserId) -> Result<Option<EmployeeProfile>, String> {
        Ok(self.profiles.iter().find(|profile| &profile.user_id == user_id).cloned())
    }

    async fn active_members_of_unit(
        &self,
        unit: &OrgUnitId,
    ) -> Result<Vec<EmployeeProfile>, String> {
        Ok(self
            .profiles
            .iter()
            .filter(|profile| profile.status.is_active())
            .filter(|profile| profile.org_unit_id.as_ref() == Some(unit))
            .cloned()
            .collect())
    }

    async fn active_employees(&self) -> Result<Vec<EmployeeProfile>, String> {
        Ok(self
            .profiles
            .iter()
            .filter(|profile| profile.status.is_active())
            .cloned()
            .collect())
    }

    async fn users_with_role(&self, role_code: &str) -> Result<Vec<UserId>, String> {
        let mut members: Vec<UserId> = self
            .role_members
            .iter()
            .filter(|(role, _)| role == role_code)
            .map(|(_, user_id)| user_id.clone())
            .collect();
        members.sort();
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::org::{EmploymentStatus, EmployeeProfile, OrgUnitId, UserAccount, UserId};

    use super::{
        parse_keyword_list, title_matches, ActorResolutionRule, ActorResolver, FallbackPolicy,
        InMemoryDirectory, ResolutionError, ResolutionMethod,
    };

    fn account(id: &str, name: &str) -> UserAccount {
        UserAccount { id: UserId(id.to_string()), display_name: name.to_string(), active: true }
    }

    fn profile(id: &str, unit: &str, title: &str) -> EmployeeProfile {
        EmployeeProfile {
            user_id: UserId(id.to_string()),
            org_unit_id: Some(OrgUnitId(unit.to_string())),
            position_title: title.to_string(),
            status: EmploymentStatus::Active,
        }
    }

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory {
            accounts: vec![
                account("u-001", "Dana Kim"),
                account("u-002", "Lee Min"),
                account("u-003", "Park Jun"),
                account("u-900", "HR Admin One"),
            ],
            profiles: vec![
                profile("u-001", "unit-eng", "Software Engineer"),
                profile("u-002", "unit-eng", "Engineering Team Leader"),
                profile("u-003", "unit-sales", "Sales Team Leader"),
                profile("u-900", "unit-hr", "HR Specialist"),
            ],
            role_members: Vec::new(),
        }
        .with_admin_pool(vec!["u-901", "u-900"])
    }

    fn rule(
        method: ResolutionMethod,
        keywords: &[&str],
        fallback: FallbackPolicy,
    ) -> ActorResolutionRule {
        ActorResolutionRule {
            role_code: "TEAM_LEADER".to_string(),
            method,
            keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
            fallback,
            active: true,
        }
    }

    #[tokio::test]
    async fn org_chain_finds_match_within_requester_unit_only() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        let actor = resolver
            .resolve(
                &UserId("u-001".to_string()),
                &rule(ResolutionMethod::OrgChain, &["team leader"], FallbackPolicy::Escalate),
            )
            .await
            .expect("resolve");

        assert_eq!(actor.user_id.0, "u-002");
        assert_eq!(actor.display_name, "Lee Min");
        assert_eq!(actor.org_unit_id.as_ref().map(|unit| unit.0.as_str()), Some("unit-eng"));
    }

    #[tokio::test]
    async fn job_position_searches_whole_population_ascending_id() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        let actor = resolver
            .resolve(
                &UserId("u-003".to_string()),
                &rule(ResolutionMethod::JobPosition, &["Team Leader"], FallbackPolicy::Escalate),
            )
            .await
            .expect("resolve");

        assert_eq!(actor.user_id.0, "u-002", "lowest matching user id wins");
    }

    #[tokio::test]
    async fn fixed_user_method_uses_admin_pool_lowest_id() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        let actor = resolver
            .resolve(
                &UserId("u-001".to_string()),
                &rule(ResolutionMethod::FixedUser, &[], FallbackPolicy::Escalate),
            )
            .await
            .expect("resolve");

        assert_eq!(actor.user_id.0, "u-900");
        assert_eq!(actor.display_name, "HR Admin One");
    }

    #[tokio::test]
    async fn escalate_fallback_fails_loudly_with_role_and_keywords() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        let error = resolver
            .resolve(
                &UserId("u-001".to_string()),
                &rule(ResolutionMethod::OrgChain, &["nonexistent title"], FallbackPolicy::Escalate),
            )
            .await
            .expect_err("no match");

        assert!(matches!(
            error,
            ResolutionError::NoMatch { ref role_code, ref keywords }
                if role_code == "TEAM_LEADER" && keywords == &vec!["nonexistent title".to_string()]
        ));
    }

    #[tokio::test]
    async fn hr_admin_and_skip_fallbacks_both_redirect_to_admin_pool() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        for fallback in [FallbackPolicy::HrAdmin, FallbackPolicy::Skip] {
            let actor = resolver
                .resolve(
                    &UserId("u-001".to_string()),
                    &rule(ResolutionMethod::OrgChain, &["nonexistent"], fallback),
                )
                .await
                .expect("fallback to admin pool");
            assert_eq!(actor.user_id.0, "u-900");
        }
    }

    #[tokio::test]
    async fn requester_without_profile_falls_back_immediately() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        let actor = resolver
            .resolve(
                &UserId("u-ghost".to_string()),
                &rule(ResolutionMethod::JobPosition, &["team leader"], FallbackPolicy::HrAdmin),
            )
            .await
            .expect("fallback");

        assert_eq!(actor.user_id.0, "u-900");
    }

    #[tokio::test]
    async fn empty_keyword_list_falls_back() {
        let directory = directory();
        let resolver = ActorResolver::new(&directory);

        let error = resolver
            .resolve(
                &UserId("u-001".to_string()),
                &rule(ResolutionMethod::OrgChain, &[], FallbackPolicy::Escalate),
            )
            .await
            .expect_err("escalate on empty keywords");

        assert!(matches!(error, ResolutionError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn empty_admin_pool_is_a_loud_error() {
        let directory = InMemoryDirectory::default();
        let resolver = ActorResolver::new(&directory);

        let error = resolver.admin_pool_actor().await.expect_err("empty pool");
        assert_eq!(error, ResolutionError::EmptyAdminPool);
    }

    #[test]
    fn keyword_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_keyword_list(" team leader , manager ,, chief "),
            vec!["team leader".to_string(), "manager".to_string(), "chief".to_string()]
        );
        assert!(parse_keyword_list("  ").is_empty());
    }

    #[test]
    fn title_match_is_case_insensitive_substring_or() {
        let keywords = vec!["Team Leader".to_string(), "manager".to_string()];
        assert!(title_matches(&keywords, "Senior TEAM LEADER, Platform"));
        assert!(title_matches(&keywords, "Engineering Manager"));
        assert!(!title_matches(&keywords, "Staff Engineer"));
    }
}
