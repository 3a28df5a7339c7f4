use serde::Deserialize;
use serde_json::Value;

// Absent, null and "" are all treated as missing.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Body of `/register` and `/login`.
#[derive(Debug, Deserialize, Default)]
pub struct CredentialsForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsForm {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((present(&self.username)?, present(&self.password)?))
    }
}

/// Body of `/admin/add-credit`.
///
/// Fields stay loosely typed so a malformed `username` or `amount` is still
/// reported after the admin key has been checked.
#[derive(Debug, Deserialize, Default)]
pub struct AddCreditForm {
    pub username: Option<Value>,
    pub amount: Option<Value>,
    #[serde(rename = "adminKey")]
    pub admin_key: Option<Value>,
}

impl AddCreditForm {
    pub fn admin_key(&self) -> Option<&str> {
        self.admin_key.as_ref().and_then(Value::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.username
            .as_ref()
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
