use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{ensure_success, parse_error, request_error, SurveyAnswers, SurveyApi};
use crate::core::error::{AppError, Result};

const SERVICE: &str = "Forms";

/// Survey returned by `forms.create`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedSurvey {
    #[serde(rename = "formId")]
    pub id: String,
    #[serde(rename = "responderUri")]
    pub responder_url: String,
}

/// A required checkbox question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyQuestion {
    pub title: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<BatchUpdateReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateReply {
    create_item: Option<CreateItemReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateItemReply {
    #[serde(default)]
    question_id: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseList {
    #[serde(default)]
    responses: Vec<FormResponse>,
}

#[derive(Debug, Deserialize)]
struct FormResponse {
    #[serde(default)]
    answers: HashMap<String, Answer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Answer {
    text_answers: Option<TextAnswers>,
}

#[derive(Debug, Deserialize)]
struct TextAnswers {
    #[serde(default)]
    answers: Vec<TextAnswer>,
}

#[derive(Debug, Deserialize)]
struct TextAnswer {
    #[serde(default)]
    value: String,
}

/// Build the `batchUpdate` payload creating one item per question, in order
fn create_items_request(items: &[SurveyQuestion]) -> Value {
    let requests: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let options: Vec<Value> = item
                .options
                .iter()
                .map(|option| json!({ "value": option }))
                .collect();

            json!({
                "createItem": {
                    "item": {
                        "title": item.title,
                        "questionItem": {
                            "question": {
                                "required": true,
                                "choiceQuestion": {
                                    "type": "CHECKBOX",
                                    "options": options,
                                    "shuffle": false,
                                }
                            }
                        }
                    },
                    "location": { "index": index }
                }
            })
        })
        .collect();

    json!({ "requests": requests })
}

fn question_ids(response: BatchUpdateResponse) -> Result<Vec<String>> {
    response
        .replies
        .into_iter()
        .map(|reply| {
            reply
                .create_item
                .and_then(|item| item.question_id.into_iter().next())
                .ok_or_else(|| {
                    AppError::ExternalServiceError(
                        "Forms batchUpdate reply without a question id".to_string(),
                    )
                })
        })
        .collect()
}

fn first_answers(list: ResponseList) -> Option<SurveyAnswers> {
    list.responses.into_iter().next().map(|response| {
        response
            .answers
            .into_iter()
            .map(|(question_id, answer)| {
                let values = answer
                    .text_answers
                    .map(|text| text.answers.into_iter().map(|a| a.value).collect())
                    .unwrap_or_default();
                (question_id, values)
            })
            .collect()
    })
}

/// Client for the Forms v1 REST API
pub struct FormsClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl FormsClient {
    pub fn new(http_client: reqwest::Client, base_url: String, access_token: String) -> Self {
        Self {
            http_client,
            base_url,
            access_token,
        }
    }
}

#[async_trait]
impl SurveyApi for FormsClient {
    async fn create_survey(&self, title: &str) -> Result<CreatedSurvey> {
        let url = format!("{}/forms", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "info": { "title": title } }))
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let survey = ensure_success(response, SERVICE)
            .await?
            .json::<CreatedSurvey>()
            .await
            .map_err(|e| parse_error(SERVICE, e))?;

        info!("Created form {}", survey.id);
        Ok(survey)
    }

    async fn add_items(&self, survey_id: &str, items: &[SurveyQuestion]) -> Result<Vec<String>> {
        let url = format!(
            "{}/forms/{}:batchUpdate",
            self.base_url,
            urlencoding::encode(survey_id)
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&create_items_request(items))
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let body = ensure_success(response, SERVICE)
            .await?
            .json::<BatchUpdateResponse>()
            .await
            .map_err(|e| parse_error(SERVICE, e))?;

        let ids = question_ids(body)?;
        debug!("Added {} items to form {}", ids.len(), survey_id);
        Ok(ids)
    }

    async fn first_response(&self, survey_id: &str) -> Result<Option<SurveyAnswers>> {
        let url = format!(
            "{}/forms/{}/responses",
            self.base_url,
            urlencoding::encode(survey_id)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let list = ensure_success(response, SERVICE)
            .await?
            .json::<ResponseList>()
            .await
            .map_err(|e| parse_error(SERVICE, e))?;

        Ok(first_answers(list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_items_request_shape() {
        let items = vec![
            SurveyQuestion {
                title: "El archivo a -> https://a".to_string(),
                options: vec!["uno".to_string(), "dos".to_string()],
            },
            SurveyQuestion {
                title: "El archivo b -> https://b".to_string(),
                options: vec!["uno".to_string()],
            },
        ];

        let body = create_items_request(&items);
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);

        let second = &requests[1]["createItem"];
        assert_eq!(second["location"]["index"], 1);
        assert_eq!(second["item"]["title"], "El archivo b -> https://b");

        let question = &requests[0]["createItem"]["item"]["questionItem"]["question"];
        assert_eq!(question["required"], true);
        assert_eq!(question["choiceQuestion"]["type"], "CHECKBOX");
        assert_eq!(question["choiceQuestion"]["options"][1]["value"], "dos");
    }

    #[test]
    fn test_question_ids_follow_reply_order() {
        let json = r#"{"replies": [
            {"createItem": {"itemId": "i1", "questionId": ["q1"]}},
            {"createItem": {"itemId": "i2", "questionId": ["q2"]}}
        ]}"#;
        let response: BatchUpdateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(question_ids(response).unwrap(), vec!["q1", "q2"]);
    }

    #[test]
    fn test_question_ids_rejects_reply_without_id() {
        let response: BatchUpdateResponse =
            serde_json::from_str(r#"{"replies": [{}]}"#).unwrap();
        assert!(question_ids(response).is_err());
    }

    #[test]
    fn test_first_answers_reads_only_first_response() {
        let json = r#"{"responses": [
            {"responseId": "r1", "answers": {
                "q1": {"questionId": "q1", "textAnswers": {"answers": [{"value": "a"}, {"value": "b"}]}},
                "q2": {"questionId": "q2"}
            }},
            {"responseId": "r2", "answers": {
                "q1": {"questionId": "q1", "textAnswers": {"answers": [{"value": "z"}]}}
            }}
        ]}"#;
        let list: ResponseList = serde_json::from_str(json).unwrap();
        let answers = first_answers(list).unwrap();

        assert_eq!(answers["q1"], vec!["a", "b"]);
        assert!(answers["q2"].is_empty());
    }

    #[test]
    fn test_no_responses_yields_none() {
        let list: ResponseList = serde_json::from_str("{}").unwrap();
        assert!(first_answers(list).is_none());
    }

    #[test]
    fn test_parse_created_survey() {
        let json = r#"{"formId": "f1", "responderUri": "https://forms.example/f1", "info": {"title": "x"}}"#;
        let survey: CreatedSurvey = serde_json::from_str(json).unwrap();
        assert_eq!(survey.id, "f1");
        assert_eq!(survey.responder_url, "https://forms.example/f1");
    }
}
