use tokio::sync::RwLock;

/// Process-lifetime bot state shared by the scheduler and command handlers.
///
/// Nothing here is persisted; a restart begins with an empty custom message.
#[derive(Default)]
pub struct BotState {
    custom_message: RwLock<String>,
}

impl BotState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message injected above the statistics block of every leaderboard.
    pub async fn custom_message(&self) -> String {
        self.custom_message.read().await.clone()
    }

    /// Replace the custom message. An empty string removes it.
    pub async fn set_custom_message(&self, message: &str) {
        *self.custom_message.write().await = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn custom_message_defaults_empty() {
        let state = BotState::new();
        assert_eq!(state.custom_message().await, "");
    }

    #[tokio::test]
    async fn custom_message_set_and_clear() {
        let state = BotState::new();
        state.set_custom_message("Giveaway at 8pm!").await;
        assert_eq!(state.custom_message().await, "Giveaway at 8pm!");
        state.set_custom_message("").await;
        assert_eq!(state.custom_message().await, "");
    }

    #[tokio::test]
    async fn custom_message_kept_verbatim() {
        let state = BotState::new();
        state.set_custom_message("  **bold**\nline two ").await;
        assert_eq!(state.custom_message().await, "  **bold**\nline two ");
    }
}
