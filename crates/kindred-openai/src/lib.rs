// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapter for Kindred.
//!
//! [`OpenAiProvider`] implements [`ResponseGenerator`], [`SpeechToText`] and
//! [`TextToSpeech`] against the chat completions, transcription and speech
//! endpoints of any API that speaks the OpenAI wire format.

pub mod client;
pub mod types;

use async_trait::async_trait;
use kindred_config::model::OpenAiConfig;
use kindred_core::{
    Character, KindredError, ResponseGenerator, Role, SpeechToText, TextToSpeech, Transcription,
    Turn,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatCompletionRequest, ChatMessage, SpeechRequest};

/// Audio container requested from the speech endpoint.
const SPEECH_FORMAT: &str = "mp3";

/// Generation, transcription and speech backed by one OpenAI-compatible API.
pub struct OpenAiProvider {
    client: OpenAiClient,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self, KindredError> {
        let api_key = config.api_key.as_deref().filter(|key| !key.trim().is_empty());
        let client = OpenAiClient::new(&config.base_url, api_key)?;

        info!(
            base_url = %client.base_url(),
            chat_model = %config.chat_model,
            authenticated = api_key.is_some(),
            "OpenAI-compatible provider initialized"
        );

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Builds the completion request: persona as the system prompt, prior
    /// turns in order, then the new user message.
    fn to_chat_request(
        &self,
        character: &Character,
        user_message: &str,
        history: &[Turn],
    ) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new("system", system_prompt(character)));
        messages.extend(history.iter().map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Character => "assistant",
            };
            ChatMessage::new(role, turn.content.clone())
        }));
        messages.push(ChatMessage::new("user", user_message));

        ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
        }
    }
}

fn system_prompt(character: &Character) -> String {
    if character.persona.trim().is_empty() {
        format!("You are {}.", character.name)
    } else {
        character.persona.clone()
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiProvider {
    async fn generate(
        &self,
        character: &Character,
        user_message: &str,
        history: &[Turn],
    ) -> Result<String, KindredError> {
        let request = self.to_chat_request(character, user_message, history);
        debug!(
            character_id = character.id,
            messages = request.messages.len(),
            "requesting chat completion"
        );
        let response = self.client.chat_completion(&request).await?;
        Ok(response.first_content().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl SpeechToText for OpenAiProvider {
    async fn transcribe(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> Result<Transcription, KindredError> {
        debug!(session_id, bytes = audio.len(), "requesting transcription");
        let response = self
            .client
            .transcription(&self.config.transcription_model, audio)
            .await?;
        Ok(Transcription::text(response.text))
    }
}

#[async_trait]
impl TextToSpeech for OpenAiProvider {
    async fn synthesize(
        &self,
        text: &str,
        voice_type: Option<&str>,
    ) -> Result<Vec<u8>, KindredError> {
        let request = SpeechRequest {
            model: self.config.speech_model.clone(),
            input: text.to_string(),
            voice: voice_type.unwrap_or(&self.config.default_voice).to_string(),
            response_format: SPEECH_FORMAT.to_string(),
        };
        self.client.speech(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn character() -> Character {
        Character {
            id: 7,
            name: "Mira".into(),
            persona: "You are Mira, a patient language tutor.".into(),
            greeting: None,
            voice_type: Some("nova".into()),
        }
    }

    fn provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(&OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn chat_request_maps_history_roles() {
        let provider = provider("http://localhost:1");
        let history = vec![Turn::user("u1", "hola"), Turn::character("c1", "¡Hola!")];
        let request = provider.to_chat_request(&character(), "how are you?", &history);

        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(request.messages[0].content, character().persona);
        assert_eq!(request.messages[3].content, "how are you?");
        assert_eq!(request.model, OpenAiConfig::default().chat_model);
        assert_eq!(request.max_tokens, Some(OpenAiConfig::default().max_tokens));
    }

    #[test]
    fn blank_persona_falls_back_to_name() {
        let mut c = character();
        c.persona = "  ".into();
        assert_eq!(system_prompt(&c), "You are Mira.");
    }

    #[test]
    fn blank_api_key_is_treated_as_absent() {
        let provider = OpenAiProvider::new(&OpenAiConfig {
            api_key: Some(" ".into()),
            ..OpenAiConfig::default()
        });
        assert!(provider.is_ok());
    }

    #[tokio::test]
    async fn generate_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{"role": "system", "content": character().persona}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "Muy bien, gracias."}}]
            })))
            .mount(&server)
            .await;

        let reply = provider(&server.uri())
            .generate(&character(), "¿Cómo estás?", &[])
            .await
            .unwrap();
        assert_eq!(reply, "Muy bien, gracias.");
    }

    #[tokio::test]
    async fn generate_with_no_choices_yields_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let reply = provider(&server.uri())
            .generate(&character(), "hi", &[])
            .await
            .unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn transcribe_has_no_sidecar_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hello"})),
            )
            .mount(&server)
            .await;

        let transcription = provider(&server.uri())
            .transcribe("session-1", &[0u8; 32])
            .await
            .unwrap();
        assert_eq!(transcription.text, "hello");
        assert!(transcription.sidecar_response.is_none());
    }

    #[tokio::test]
    async fn synthesize_uses_default_voice_without_voice_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(serde_json::json!({
                "voice": OpenAiConfig::default().default_voice,
                "model": OpenAiConfig::default().speech_model,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let audio = provider(&server.uri()).synthesize("hi", None).await.unwrap();
        assert_eq!(audio, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn synthesize_uses_character_voice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(serde_json::json!({"voice": "nova"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![4u8]))
            .expect(1)
            .mount(&server)
            .await;

        let audio = provider(&server.uri())
            .synthesize("hi", Some("nova"))
            .await
            .unwrap();
        assert_eq!(audio, vec![4]);
    }
}
