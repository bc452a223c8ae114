//! Interactive credential prompt.

use async_trait::async_trait;

use crate::deliverer::CredentialPrompt;
use crate::error::{DeliveryError, ExecutionError, Result};
use crate::planner::NodeConnection;

/// Reads missing node credentials from the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// Prints a question on stderr and reads one line from stdin.
    async fn read_line(node: &str, question: String) -> Result<String> {
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{question}");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| DeliveryError::internal(format!("Prompt aborted: {e}")))?;

        let line = answer.map_err(|e| ExecutionError::Credentials {
            node: node.to_string(),
            message: e.to_string(),
        })?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
    async fn ask(&self, node: &NodeConnection) -> Result<(String, String)> {
        let user = match &node.user {
            Some(user) => user.clone(),
            None => {
                let question = format!("User for {} ({}): ", node.name, node.location);
                Self::read_line(&node.name, question).await?
            }
        };
        let password = match &node.password {
            Some(password) => password.clone(),
            None => {
                let question = format!("Password for {user}@{}: ", node.name);
                Self::read_line(&node.name, question).await?
            }
        };
        Ok((user, password))
    }
}
