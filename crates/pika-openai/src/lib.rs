// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statement translator backed by the OpenAI chat completions API.
//!
//! The model's answer is only ever a candidate: this crate parses it into a
//! [`Translation`] and checks that it carries at most one statement, but the
//! statement itself is judged by the validator downstream.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use pika_config::model::OpenAiConfig;
use pika_core::traits::{PluginAdapter, StatementTranslator};
use pika_core::{
    AdapterType, HealthStatus, PikaError, Translation, TranslationError, TranslationRequest,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatMessage, ChatRequest, ModelReply, ResponseFormat};

/// Instructions placed before the schema description in the system prompt.
const INSTRUCTIONS: &str = "\
Eres el asistente de base de datos de Pika Snacks. Interpretas mensajes en \
español de los operadores de ventas y los conviertes en UNA sola sentencia SQL \
para PostgreSQL.

## Reglas
1. Genera exactamente una sentencia SELECT, INSERT o UPDATE. Nada más.
2. Sin punto y coma intermedios, sin comentarios, sin BEGIN/COMMIT, sin WITH, \
sin RETURNING.
3. Usa solo las tablas y vistas del esquema; las vistas solo se leen.
4. Para clientes nuevos genera source_client_id como 'telegram_' + nombre sin \
espacios en minúsculas + '_' + últimos dígitos del teléfono.
5. Para pedidos busca el client_id con una subconsulta por nombre o teléfono.
6. Los precios están en pesos colombianos.
7. Si el mensaje es ambiguo (por ejemplo, varios clientes posibles o falta un \
dato obligatorio), pide una aclaración en lugar de adivinar.
8. Si el mensaje no pide ninguna operación (un saludo, una pregunta general), \
responde con un mensaje.

## Formato de respuesta
Responde SOLO con un objeto JSON:
{\"tipo\": \"query\", \"sql\": \"...\", \"descripcion\": \"resumen breve de la acción\"}
{\"tipo\": \"aclaracion\", \"pregunta\": \"...\"}
{\"tipo\": \"mensaje\", \"mensaje\": \"...\"}

## Ejemplo
Usuario: \"Agregar cliente Juan, tel 3001234567\"
{\"tipo\": \"query\", \"sql\": \"INSERT INTO clients (name, phone, source_client_id) \
VALUES ('Juan', '3001234567', 'telegram_juan_4567')\", \"descripcion\": \"Agregar cliente Juan\"}
";

const DEFAULT_SUMMARY: &str = "Ejecutar consulta";

/// OpenAI-backed [`StatementTranslator`].
pub struct OpenAiTranslator {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiTranslator {
    /// Builds the translator. The API key comes from `openai.api_key`, or
    /// from `OPENAI_API_KEY` when the config leaves it unset.
    pub fn new(config: &OpenAiConfig) -> Result<Self, PikaError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(model = %config.model, "OpenAI translator initialized");
        Ok(Self::with_client(client, config))
    }

    fn with_client(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn to_chat_request(&self, request: &TranslationRequest) -> ChatRequest {
        let mut messages = vec![ChatMessage::system(format!(
            "{INSTRUCTIONS}\n{}",
            request.schema
        ))];

        // A clarification answer is sent as the continuation of the
        // ambiguous exchange, so the model sees all three turns.
        match &request.clarification {
            Some(context) => {
                messages.push(ChatMessage::user(context.original_message.clone()));
                messages.push(ChatMessage::assistant(
                    serde_json::json!({"tipo": "aclaracion", "pregunta": context.question})
                        .to_string(),
                ));
                messages.push(ChatMessage::user(request.message.clone()));
            }
            None => messages.push(ChatMessage::user(request.message.clone())),
        }

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat::json_object(),
        }
    }
}

fn resolve_api_key(configured: Option<&str>) -> Result<String, PikaError> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            PikaError::Config(
                "OpenAI API key not set: use openai.api_key, PIKA_OPENAI_API_KEY or OPENAI_API_KEY"
                    .into(),
            )
        })
}

/// Parses the model's answer into a [`Translation`].
///
/// Markdown code fences around the JSON are tolerated. A `query` answer
/// must carry exactly one statement.
pub fn parse_reply(content: &str) -> Result<Translation, TranslationError> {
    let json = strip_code_fences(content);
    if json.is_empty() {
        return Err(TranslationError::Empty);
    }

    let reply: ModelReply = serde_json::from_str(json)
        .map_err(|e| TranslationError::Malformed(format!("reply is not the expected JSON: {e}")))?;

    let non_empty = |field: Option<String>| field.filter(|s| !s.trim().is_empty());

    match reply.tipo.as_str() {
        "query" => {
            let sql = non_empty(reply.sql).ok_or(TranslationError::Empty)?;
            match pika_sql::count_statements(&sql) {
                Ok(0) => return Err(TranslationError::Empty),
                Ok(1) => {}
                Ok(_) => return Err(TranslationError::MultipleStatements),
                Err(e) => return Err(TranslationError::Malformed(e.to_string())),
            }
            Ok(Translation::Statement {
                sql: sql.trim().to_string(),
                summary: non_empty(reply.descripcion)
                    .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
            })
        }
        "aclaracion" => non_empty(reply.pregunta)
            .map(|question| Translation::Clarify { question })
            .ok_or_else(|| TranslationError::Malformed("clarification without a question".into())),
        "mensaje" => non_empty(reply.mensaje)
            .map(|text| Translation::Reply { text })
            .ok_or(TranslationError::Empty),
        other => Err(TranslationError::Malformed(format!(
            "unknown reply kind `{}`",
            other.chars().take(32).collect::<String>()
        ))),
    }
}

/// Strips a surrounding ```json ... ``` fence, if any.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl PluginAdapter for OpenAiTranslator {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Translator
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        Ok(())
    }
}

#[async_trait]
impl StatementTranslator for OpenAiTranslator {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<Translation, TranslationError> {
        let chat = self.to_chat_request(request);
        let content = self.client.complete(&chat).await?;
        let translation = parse_reply(&content)?;
        debug!(
            kind = match &translation {
                Translation::Statement { .. } => "statement",
                Translation::Clarify { .. } => "clarify",
                Translation::Reply { .. } => "reply",
            },
            "translation parsed"
        );
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pika_core::ClarificationContext;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn translator(base_url: &str) -> OpenAiTranslator {
        let config = OpenAiConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            ..OpenAiConfig::default()
        };
        OpenAiTranslator::new(&config).unwrap()
    }

    fn request(message: &str) -> TranslationRequest {
        TranslationRequest {
            schema: "Tables:\n- clients".into(),
            message: message.into(),
            clarification: None,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn parses_query_reply() {
        let translation = parse_reply(
            r#"{"tipo":"query","sql":"SELECT * FROM clients;","descripcion":"Listar clientes"}"#,
        )
        .unwrap();
        assert_eq!(
            translation,
            Translation::Statement {
                sql: "SELECT * FROM clients;".into(),
                summary: "Listar clientes".into(),
            }
        );
    }

    #[test]
    fn strips_code_fences() {
        let fenced = "```json\n{\"tipo\":\"mensaje\",\"mensaje\":\"¡Hola!\"}\n```";
        assert_eq!(
            parse_reply(fenced).unwrap(),
            Translation::Reply {
                text: "¡Hola!".into()
            }
        );
        let bare = "```\n{\"tipo\":\"aclaracion\",\"pregunta\":\"¿Cuál Juan?\"}\n```";
        assert_eq!(
            parse_reply(bare).unwrap(),
            Translation::Clarify {
                question: "¿Cuál Juan?".into()
            }
        );
    }

    #[test]
    fn missing_summary_gets_default() {
        let translation = parse_reply(r#"{"tipo":"query","sql":"SELECT 1 FROM clients"}"#).unwrap();
        assert!(matches!(translation, Translation::Statement { summary, .. } if summary == DEFAULT_SUMMARY));
    }

    #[test]
    fn multiple_statements_are_a_translation_error() {
        assert_eq!(
            parse_reply(r#"{"tipo":"query","sql":"SELECT * FROM clients; SELECT * FROM orders;"}"#)
                .unwrap_err(),
            TranslationError::MultipleStatements
        );
    }

    #[test]
    fn terminator_inside_literal_is_one_statement() {
        assert!(parse_reply(r#"{"tipo":"query","sql":"SELECT * FROM clients WHERE name = 'a;b'"}"#).is_ok());
    }

    #[test]
    fn empty_and_malformed_replies() {
        assert_eq!(parse_reply("  ").unwrap_err(), TranslationError::Empty);
        assert_eq!(
            parse_reply(r#"{"tipo":"query","sql":"  "}"#).unwrap_err(),
            TranslationError::Empty
        );
        assert!(matches!(parse_reply("not json").unwrap_err(), TranslationError::Malformed(_)));
        assert!(matches!(
            parse_reply(r#"{"tipo":"borrar"}"#).unwrap_err(),
            TranslationError::Malformed(_)
        ));
        assert!(matches!(
            parse_reply(r#"{"sql":"SELECT 1"}"#).unwrap_err(),
            TranslationError::Malformed(_)
        ));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = OpenAiConfig {
            api_key: Some("   ".into()),
            ..OpenAiConfig::default()
        };
        assert!(matches!(
            OpenAiTranslator::new(&config),
            Err(PikaError::Config(_))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn api_key_falls_back_to_environment() {
        // SAFETY: test-only env mutation, serialized with #[serial].
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-from-env") };
        let from_env = resolve_api_key(None);
        let configured = resolve_api_key(Some("sk-from-config"));
        unsafe { std::env::remove_var("OPENAI_API_KEY") };

        assert_eq!(from_env.unwrap(), "sk-from-env");
        assert_eq!(configured.unwrap(), "sk-from-config");
    }

    #[test]
    #[serial_test::serial]
    fn no_key_anywhere_is_a_config_error() {
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        assert!(matches!(resolve_api_key(None), Err(PikaError::Config(_))));
    }

    #[test]
    fn clarification_is_sent_as_three_turns() {
        let t = translator("http://localhost");
        let mut req = request("el de Medellín");
        req.clarification = Some(ClarificationContext {
            original_message: "pedido de Juan".into(),
            question: "¿Cuál Juan?".into(),
        });
        let chat = t.to_chat_request(&req);
        let roles: Vec<&str> = chat.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(chat.messages[1].content.as_deref(), Some("pedido de Juan"));
        assert_eq!(chat.messages[3].content.as_deref(), Some("el de Medellín"));
        assert!(chat.messages[0].content.as_deref().unwrap_or_default().contains("- clients"));
    }

    #[tokio::test]
    async fn translate_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"tipo":"query","sql":"INSERT INTO clients (name, phone, source_client_id) VALUES ('Juan','3001234567','src_juan_300');","descripcion":"Agregar cliente Juan"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let translation = translator(&server.uri())
            .translate(&request("Agregar cliente Juan, tel 3001234567"))
            .await
            .unwrap();
        assert!(matches!(
            translation,
            Translation::Statement { ref summary, .. } if summary == "Agregar cliente Juan"
        ));
    }

    #[tokio::test]
    async fn adapter_metadata() {
        let t = translator("http://localhost");
        assert_eq!(t.name(), "openai");
        assert_eq!(t.adapter_type(), AdapterType::Translator);
        assert_eq!(t.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
