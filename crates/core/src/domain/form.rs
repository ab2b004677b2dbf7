use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormTypeId(pub String);

/// A request category. `code` is the prefix used in issued request numbers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormType {
    pub id: FormTypeId,
    pub code: String,
    pub name: String,
    pub module: String,
    pub allow_draft_edit: bool,
    pub allow_withdraw: bool,
    pub requires_receive: bool,
    pub default_priority: i32,
}
