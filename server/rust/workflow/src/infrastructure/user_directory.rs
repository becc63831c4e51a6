use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::domain::service::assignment_resolver::UserDirectory;
use crate::infrastructure::config::DirectoryConfig;

const ANY_SCOPE: &str = "*";

/// ConfigUserDirectory は設定ファイルの静的な割当表を使う UserDirectory 実装。
/// scope "*" に登録されたユーザーは全スコープで有効。
pub struct ConfigUserDirectory {
    roles: HashMap<String, HashMap<String, Vec<String>>>,
    override_users: HashSet<String>,
}

impl ConfigUserDirectory {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            roles: config.roles.clone(),
            override_users: config.override_users.iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for ConfigUserDirectory {
    async fn users_with_role(&self, role: &str, scope_id: &str) -> anyhow::Result<Vec<String>> {
        let Some(scopes) = self.roles.get(role) else {
            return Ok(Vec::new());
        };

        let mut users: Vec<String> = [scope_id, ANY_SCOPE]
            .iter()
            .filter_map(|scope| scopes.get(*scope))
            .flatten()
            .cloned()
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    async fn has_override_capability(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.override_users.contains(user_id))
    }
}
