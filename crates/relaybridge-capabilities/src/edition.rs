use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edition {
    Core,
    Enterprise,
}

impl Edition {
    pub fn as_str(self) -> &'static str {
        match self {
            Edition::Core => "core",
            Edition::Enterprise => "enterprise",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityMode {
    Readonly,
    WriteEnabled,
}

impl AuthorityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorityMode::Readonly => "readonly",
            AuthorityMode::WriteEnabled => "write_enabled",
        }
    }
}
