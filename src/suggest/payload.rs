//! Request payload for the generateContent endpoint
//!
//! One body per request: the reviewer prompt plus a response schema that
//! pins the reply to a JSON object with exactly `grade` and `feedback`.

use serde::Serialize;

use super::SuggestionRequest;

/// Body of one generateContent call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: ResponseSchema,
}

#[derive(Debug, Serialize)]
struct ResponseSchema {
    #[serde(rename = "type")]
    schema_type: &'static str,
    properties: SchemaProperties,
    required: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct SchemaProperties {
    grade: SchemaField,
    feedback: SchemaField,
}

#[derive(Debug, Serialize)]
struct SchemaField {
    #[serde(rename = "type")]
    field_type: &'static str,
    description: &'static str,
}

/// Reviewer instructions with the question and submission interpolated
fn build_prompt(request: &SuggestionRequest) -> String {
    format!(
        "You are a Teaching Assistant for a university course. Your task is to review a student submission against the assignment question and provide a structured grade and feedback.\n\
         \n\
         Assignment Question: \"{}\"\n\
         Student Submission: \"{}\"\n\
         \n\
         Provide a grade (A+, B-, 85%, etc.) and a short, constructive feedback message (2-3 sentences) based purely on the submission quality. The grade should be a single string, and the feedback should be a single string.",
        request.question, request.submission_text
    )
}

/// Assemble the full request body for one suggestion
pub fn build_request(request: &SuggestionRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: build_prompt(request),
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: ResponseSchema {
                schema_type: "OBJECT",
                properties: SchemaProperties {
                    grade: SchemaField {
                        field_type: "STRING",
                        description: "The final suggested grade, e.g., 'A-'",
                    },
                    feedback: SchemaField {
                        field_type: "STRING",
                        description: "Constructive feedback for the student (2-3 sentences).",
                    },
                },
                required: ["grade", "feedback"],
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_question_and_submission() {
        let request = SuggestionRequest::new("Explain TCP slow start.", "It ramps the window.");
        let prompt = build_prompt(&request);
        assert!(prompt.starts_with("You are a Teaching Assistant"));
        assert!(prompt.contains("Assignment Question: \"Explain TCP slow start.\""));
        assert!(prompt.contains("Student Submission: \"It ramps the window.\""));
    }

    #[test]
    fn test_request_body_declares_json_schema() {
        let request = SuggestionRequest::new("Q", "S");
        let body = serde_json::to_value(build_request(&request)).unwrap();

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
        assert_eq!(config["responseSchema"]["required"][0], "grade");
        assert_eq!(config["responseSchema"]["required"][1], "feedback");
        assert_eq!(
            config["responseSchema"]["properties"]["grade"]["type"],
            "STRING"
        );
        assert_eq!(
            config["responseSchema"]["properties"]["feedback"]["type"],
            "STRING"
        );

        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"Q\""));
        assert!(text.contains("\"S\""));
    }
}
