//! ChatService - aquaponics care assistant
//!
//! Stateless text-completion call against Gemini plus a bounded session
//! history: each session keeps its full transcript in Postgres but only
//! the last five exchanges are fed back as prompt context.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Exchanges kept as prompt context
const CONTEXT_WINDOW: usize = 5;

/// Reply used when the model returns no usable candidate
const FALLBACK_REPLY: &str = "I couldn't generate a response.";

const PROMPT_TEMPLATE: &str = "You are an AI chatbot that provides helpful information about how to care for aquaponic systems.\n\
You will provide information and suggestions to users about their aquaponic systems.\n\
\n\
Conversation History:\n\
{history}\n\
\n\
User: {query}\n\
Bot:";

/// One stored user/assistant exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExchange {
    pub query: String,
    pub response: String,
}

/// Gemini REST client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    /// Run one completion. Missing candidates degrade to the fallback
    /// reply rather than an error, matching the assistant's best-effort
    /// contract.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": 100,
                "temperature": 0.5,
                "topP": 0.9
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Chat(e.to_string()))?;

        let value: serde_json::Value = response.json().await?;
        let reply = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or(FALLBACK_REPLY)
            .to_string();

        Ok(reply)
    }
}

/// Session transcript persistence
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, session_id: Uuid) -> Result<Option<Vec<ChatExchange>>> {
        let row = sqlx::query("SELECT messages FROM chat_sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let messages: serde_json::Value = row.get("messages");
                let exchanges: Vec<ChatExchange> =
                    serde_json::from_value(messages).unwrap_or_default();
                Ok(Some(exchanges))
            }
            None => Ok(None),
        }
    }

    pub async fn put(&self, session_id: Uuid, messages: &[ChatExchange]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (session_id, messages, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id)
            DO UPDATE SET messages = EXCLUDED.messages, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(session_id)
        .bind(serde_json::to_value(messages)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, session_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Assistant facade used by the chat routes
pub struct ChatService {
    gemini: GeminiClient,
    sessions: SessionRepository,
}

/// Outcome of one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub response: String,
}

impl ChatService {
    pub fn new(gemini: GeminiClient, sessions: SessionRepository) -> Self {
        Self { gemini, sessions }
    }

    /// Answer one query within a session, creating the session when no id
    /// is supplied.
    pub async fn chat(&self, session_id: Option<Uuid>, query: &str) -> Result<ChatReply> {
        let (session_id, mut messages) = match session_id {
            Some(id) => {
                let messages = self.sessions.get(id).await?.unwrap_or_default();
                (id, messages)
            }
            None => {
                let id = Uuid::new_v4();
                self.sessions.put(id, &[]).await?;
                (id, Vec::new())
            }
        };

        let context_start = messages.len().saturating_sub(CONTEXT_WINDOW);
        let prompt = render_prompt(&messages[context_start..], query);

        let response = self.gemini.generate(&prompt).await?;

        messages.push(ChatExchange {
            query: query.to_string(),
            response: response.clone(),
        });
        self.sessions.put(session_id, &messages).await?;

        tracing::debug!(session_id = %session_id, "Chat turn completed");
        Ok(ChatReply {
            session_id,
            response,
        })
    }

    /// Full transcript for a session
    pub async fn history(&self, session_id: Uuid) -> Result<Vec<ChatExchange>> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))
    }

    /// Delete a session
    pub async fn delete(&self, session_id: Uuid) -> Result<()> {
        self.sessions.delete(session_id).await?;
        Ok(())
    }
}

/// Render the care-assistant prompt from bounded history
fn render_prompt(history: &[ChatExchange], query: &str) -> String {
    let rendered: Vec<String> = history
        .iter()
        .map(|m| format!("User: {}\nBot: {}", m.query, m.response))
        .collect();

    PROMPT_TEMPLATE
        .replace("{history}", &rendered.join("\n"))
        .replace("{query}", query)
}
