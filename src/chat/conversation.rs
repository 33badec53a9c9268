//! Conversation state: an ordered, append-only list of messages

use serde::{Deserialize, Serialize};

/// Shown whenever the conversation is rendered empty
pub const WELCOME_MESSAGE: &str = r#"## Welcome to Ollama Chat! 🎉

To get started, you'll need to install Ollama and pull the Llama3 model. Here's how:

### 1. **Install Ollama**
Run the following command in your terminal to install Ollama:

```bash
curl -fsSL https://ollama.ai/install.sh | sh
```

### 2. **Pull the Llama3 Model**
Once Ollama is installed, download the Llama3 model:

```bash
ollama pull llama3
```

### 3. **Run the Model**
Start interacting with the model using:

```bash
ollama run llama3
```

### 4. **Use the API**
You are ready to go

Feel free to ask me anything once you're set up! 😊
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("a generation is already in flight for this conversation")]
    GenerationInFlight,

    #[error("no generation is in flight for this conversation")]
    NoGenerationInFlight,
}

/// Chronological message list with at most one message still being written.
///
/// Messages are only ever appended. The in-flight assistant message is
/// tracked by index, so notices appended while it streams (for example a
/// parse error) never receive its text.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    in_flight: Option<usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append the user's prompt. Refused while a reply is still streaming.
    pub fn push_user(&mut self, content: impl Into<String>) -> Result<(), ConversationError> {
        if self.is_generating() {
            return Err(ConversationError::GenerationInFlight);
        }
        self.messages.push(Message::user(content));
        Ok(())
    }

    /// Append a finished assistant message (errors, notices)
    pub fn push_notice(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Open a new, empty assistant message that will receive streamed text
    pub fn begin_assistant(&mut self) -> Result<(), ConversationError> {
        if self.is_generating() {
            return Err(ConversationError::GenerationInFlight);
        }
        self.messages.push(Message::assistant(String::new()));
        self.in_flight = Some(self.messages.len() - 1);
        Ok(())
    }

    /// Append streamed text to the in-flight message
    pub fn append_to_streaming(&mut self, text: &str) -> Result<(), ConversationError> {
        let idx = self.in_flight.ok_or(ConversationError::NoGenerationInFlight)?;
        self.messages[idx].content.push_str(text);
        Ok(())
    }

    /// Content written so far by the in-flight generation
    pub fn streaming_content(&self) -> Option<&str> {
        self.in_flight.map(|idx| self.messages[idx].content.as_str())
    }

    /// Seal the in-flight message; it is immutable from here on
    pub fn finish_assistant(&mut self) -> Option<&Message> {
        let idx = self.in_flight.take()?;
        self.messages.get(idx)
    }

    /// Remove every message
    pub fn clear(&mut self) -> Result<(), ConversationError> {
        if self.is_generating() {
            return Err(ConversationError::GenerationInFlight);
        }
        self.messages.clear();
        Ok(())
    }

    /// Put the welcome message in an empty conversation. Returns whether it did.
    pub fn ensure_welcome(&mut self) -> bool {
        if !self.messages.is_empty() {
            return false;
        }
        self.messages.push(Message::assistant(WELCOME_MESSAGE));
        true
    }

    /// Most recent assistant reply that is not the welcome message
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.content != WELCOME_MESSAGE)
    }
}
