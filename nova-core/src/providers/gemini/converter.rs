//! Conversion between Nova protocol types and the Gemini wire format

use super::types::*;
use crate::protocol::{Part, Role, ToolCallRequest, ToolDeclaration, Turn};
use crate::providers::adapter::{Fragment, GenerationRequest};
use serde_json::json;

/// Convert a generation request to Gemini format
pub fn to_gemini_request(request: &GenerationRequest) -> GeminiRequest {
    GeminiRequest {
        contents: request.history.turns().iter().map(to_gemini_content).collect(),
        system_instruction: request.system_instruction.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(text.clone()),
                ..Default::default()
            }],
        }),
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request.tools.iter().map(to_gemini_declaration).collect(),
            }])
        },
    }
}

/// Convert a turn to Gemini content
fn to_gemini_content(turn: &Turn) -> GeminiContent {
    GeminiContent {
        role: Some(
            match turn.role {
                Role::User => "user",
                Role::Model => "model",
            }
            .to_string(),
        ),
        parts: turn.parts.iter().map(to_gemini_part).collect(),
    }
}

fn to_gemini_part(part: &Part) -> GeminiPart {
    match part {
        Part::Text(text) => GeminiPart {
            text: Some(text.clone()),
            ..Default::default()
        },
        Part::FunctionCall(call) => GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: call.name.clone(),
                args: Some(call.args.clone()),
            }),
            ..Default::default()
        },
        Part::FunctionResponse(result) => GeminiPart {
            function_response: Some(GeminiFunctionResponse {
                name: result.name.clone(),
                response: json!({ "result": result.response.result }),
            }),
            ..Default::default()
        },
    }
}

/// Convert a tool declaration to a Gemini function declaration
fn to_gemini_declaration(decl: &ToolDeclaration) -> GeminiFunctionDeclaration {
    GeminiFunctionDeclaration {
        name: decl.name.clone(),
        description: decl.description.clone(),
        parameters: if decl.parameters.is_empty() {
            None
        } else {
            Some(GeminiSchema {
                schema_type: "OBJECT".to_string(),
                properties: decl
                    .parameters
                    .iter()
                    .map(|(name, spec)| {
                        (
                            name.clone(),
                            GeminiPropertySchema {
                                schema_type: spec.param_type.to_uppercase(),
                                description: spec.description.clone(),
                            },
                        )
                    })
                    .collect(),
                required: decl.required.clone(),
            })
        },
    }
}

/// Convert one streamed response event into fragments.
///
/// Text parts of the first candidate are joined into a single text fragment;
/// function calls become one tool-call fragment emitted after the text.
pub fn from_gemini_response(response: GeminiResponse) -> Vec<Fragment> {
    let Some(content) = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
    else {
        return Vec::new();
    };

    let mut text = String::new();
    let mut calls = Vec::new();
    for part in content.parts {
        if let Some(call) = part.function_call {
            calls.push(ToolCallRequest::new(call.name, call.args.unwrap_or_default()));
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    let mut fragments = Vec::with_capacity(2);
    if !text.is_empty() {
        fragments.push(Fragment::Text(text));
    }
    if !calls.is_empty() {
        fragments.push(Fragment::ToolCalls(calls));
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{History, Message, ParameterSpec, ToolCallResult};

    #[test]
    fn test_request_carries_roles_system_and_tools() {
        let mut history = History::from_messages(&[Message::user("roll a die")]);
        let mut args = serde_json::Map::new();
        args.insert("min".into(), json!(1));
        history.push(Turn::function_call(ToolCallRequest::new("get_random_number", args)));
        history.push(Turn::function_response(ToolCallResult::new(
            "get_random_number",
            json!(4),
        )));

        let request = GenerationRequest::new("gemini-2.0-flash", history)
            .with_system_instruction("be brief")
            .with_tools(vec![ToolDeclaration::new("get_random_number", "random")
                .with_param("min", ParameterSpec::new("number", "lower bound"))]);

        let wire = serde_json::to_value(to_gemini_request(&request)).unwrap();

        assert_eq!(wire["contents"][0]["role"], "user");
        assert_eq!(wire["contents"][0]["parts"][0]["text"], "roll a die");
        assert_eq!(wire["contents"][1]["role"], "model");
        assert_eq!(wire["contents"][1]["parts"][0]["functionCall"]["name"], "get_random_number");
        assert_eq!(wire["contents"][2]["role"], "user");
        assert_eq!(
            wire["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
            4
        );
        assert_eq!(wire["systemInstruction"]["parts"][0]["text"], "be brief");
        let decl = &wire["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["parameters"]["type"], "OBJECT");
        assert_eq!(decl["parameters"]["properties"]["min"]["type"], "NUMBER");
        assert_eq!(decl["parameters"]["required"][0], "min");
    }

    #[test]
    fn test_request_without_tools_omits_block() {
        let request = GenerationRequest::new("m", History::from_messages(&[Message::user("hi")]));
        let wire = serde_json::to_value(to_gemini_request(&request)).unwrap();
        assert_eq!(wire.get("tools"), None);
        assert_eq!(wire.get("systemInstruction"), None);
    }

    #[test]
    fn test_declaration_without_params_has_no_schema() {
        let decl = to_gemini_declaration(&ToolDeclaration::new("get_time", "time"));
        assert!(decl.parameters.is_none());
    }

    #[test]
    fn test_response_with_text_and_call() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Let me check. " },
                        { "functionCall": { "name": "get_time", "args": {} } }
                    ]
                }
            }]
        }))
        .unwrap();

        let fragments = from_gemini_response(response);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], Fragment::Text("Let me check. ".into()));
        match &fragments[1] {
            Fragment::ToolCalls(calls) => {
                assert_eq!(calls[0].name, "get_time");
                assert!(calls[0].args.is_empty());
            }
            other => panic!("unexpected fragment {:?}", other),
        }
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "usageMetadata": { "promptTokenCount": 3, "totalTokenCount": 3 }
        }))
        .unwrap();
        assert!(from_gemini_response(response).is_empty());
    }
}
