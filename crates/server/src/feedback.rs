//! Evaluator feedback: the criteria catalog and submitted scores.

use std::collections::HashSet;

use chrono::Utc;
use speakspace_shared::{
    CreateFeedbackRequest, Feedback, FeedbackCategory, FeedbackCriterion, PracticeSession,
    MAX_RATING, MIN_RATING,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("at least one rating is required")]
    NoRatings,
    #[error("unknown criterion {0}")]
    UnknownCriterion(String),
    #[error("criterion {0} is rated more than once")]
    DuplicateCriterion(String),
    #[error("rating {rating} for criterion {criterion} is outside 1-5")]
    RatingOutOfRange { criterion: String, rating: u8 },
    #[error("user {0} is not a participant in this session")]
    NotAParticipant(String),
}

const SEED: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "Communication",
        "Evaluation of verbal and non-verbal communication skills",
        &[
            ("Clarity", "Ability to express ideas clearly and concisely"),
            ("Body Language", "Effective use of gestures, posture, and eye contact"),
        ],
    ),
    (
        "Content",
        "Quality and relevance of content presented",
        &[
            ("Relevance", "Relevance of points to the topic at hand"),
            ("Structure", "Logical organization and flow of ideas"),
        ],
    ),
    (
        "Critical Thinking",
        "Evaluation of analytical and problem solving abilities",
        &[
            ("Analysis", "Ability to analyze problems and situations"),
            ("Reasoning", "Quality of logical arguments and conclusions"),
        ],
    ),
];

fn seeded_categories() -> Vec<FeedbackCategory> {
    let mut criterion_id = 0;
    SEED.iter()
        .enumerate()
        .map(|(index, (name, description, criteria))| FeedbackCategory {
            id: (index + 1).to_string(),
            name: name.to_string(),
            description: description.to_string(),
            criteria: criteria
                .iter()
                .map(|(name, description)| {
                    criterion_id += 1;
                    FeedbackCriterion {
                        id: criterion_id.to_string(),
                        name: name.to_string(),
                        description: description.to_string(),
                    }
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug)]
pub struct FeedbackStore {
    categories: Vec<FeedbackCategory>,
    entries: RwLock<Vec<Feedback>>,
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self {
            categories: seeded_categories(),
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[FeedbackCategory] {
        &self.categories
    }

    fn has_criterion(&self, id: &str) -> bool {
        self.categories
            .iter()
            .flat_map(|c| &c.criteria)
            .any(|c| c.id == id)
    }

    /// Record `evaluator_id`'s scores for a participant of `session`.
    pub async fn submit(
        &self,
        evaluator_id: &str,
        session: &PracticeSession,
        request: CreateFeedbackRequest,
    ) -> Result<Feedback, FeedbackError> {
        if !session.has_participant(&request.recipient_id) {
            return Err(FeedbackError::NotAParticipant(request.recipient_id));
        }
        if request.ratings.is_empty() {
            return Err(FeedbackError::NoRatings);
        }

        let mut seen = HashSet::new();
        for rating in &request.ratings {
            if !self.has_criterion(&rating.criterion_id) {
                return Err(FeedbackError::UnknownCriterion(rating.criterion_id.clone()));
            }
            if !seen.insert(rating.criterion_id.as_str()) {
                return Err(FeedbackError::DuplicateCriterion(rating.criterion_id.clone()));
            }
            if !(MIN_RATING..=MAX_RATING).contains(&rating.rating) {
                return Err(FeedbackError::RatingOutOfRange {
                    criterion: rating.criterion_id.clone(),
                    rating: rating.rating,
                });
            }
        }

        let feedback = Feedback {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            evaluator_id: evaluator_id.to_string(),
            recipient_id: request.recipient_id,
            ratings: request.ratings,
            created_at: Utc::now(),
        };
        self.entries.write().await.push(feedback.clone());
        Ok(feedback)
    }

    pub async fn given(&self, evaluator_id: &str) -> Vec<Feedback> {
        self.matching(|f| f.evaluator_id == evaluator_id).await
    }

    pub async fn received(&self, recipient_id: &str) -> Vec<Feedback> {
        self.matching(|f| f.recipient_id == recipient_id).await
    }

    async fn matching(&self, keep: impl Fn(&Feedback) -> bool) -> Vec<Feedback> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|f| keep(f))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speakspace_shared::{CriterionRating, SessionStatus};

    fn session_with(participants: &[&str]) -> PracticeSession {
        PracticeSession {
            id: "s1".to_string(),
            title: "Debate".to_string(),
            description: String::new(),
            moderator_id: "1".to_string(),
            participants: participants.iter().map(|p| p.to_string()).collect(),
            max_participants: 10,
            start_time: None,
            end_time: None,
            status: SessionStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn rate(criterion_id: &str, rating: u8) -> CriterionRating {
        CriterionRating {
            criterion_id: criterion_id.to_string(),
            rating,
            comment: "ok".to_string(),
        }
    }

    fn request(recipient_id: &str, ratings: Vec<CriterionRating>) -> CreateFeedbackRequest {
        CreateFeedbackRequest {
            session_id: "s1".to_string(),
            recipient_id: recipient_id.to_string(),
            ratings,
        }
    }

    #[test]
    fn test_seeded_criteria_have_unique_ids() {
        let store = FeedbackStore::new();
        let names: Vec<&str> = store.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Communication", "Content", "Critical Thinking"]);

        let ids: HashSet<&str> = store
            .categories()
            .iter()
            .flat_map(|c| &c.criteria)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids.len(), 6);
    }

    #[tokio::test]
    async fn test_submit_validates_ratings() {
        let store = FeedbackStore::new();
        let session = session_with(&["2"]);

        let cases = [
            (request("9", vec![rate("1", 3)]), FeedbackError::NotAParticipant("9".into())),
            (request("2", vec![]), FeedbackError::NoRatings),
            (request("2", vec![rate("99", 3)]), FeedbackError::UnknownCriterion("99".into())),
            (
                request("2", vec![rate("1", 3), rate("1", 4)]),
                FeedbackError::DuplicateCriterion("1".into()),
            ),
            (
                request("2", vec![rate("2", 6)]),
                FeedbackError::RatingOutOfRange { criterion: "2".into(), rating: 6 },
            ),
            (
                request("2", vec![rate("2", 0)]),
                FeedbackError::RatingOutOfRange { criterion: "2".into(), rating: 0 },
            ),
        ];
        for (request, expected) in cases {
            assert_eq!(store.submit("3", &session, request).await, Err(expected));
        }
        assert!(store.given("3").await.is_empty());
    }

    #[tokio::test]
    async fn test_given_and_received() {
        let store = FeedbackStore::new();
        let session = session_with(&["2", "4"]);

        store
            .submit("3", &session, request("2", vec![rate("1", 5), rate("3", 4)]))
            .await
            .unwrap();
        store
            .submit("3", &session, request("4", vec![rate("6", 2)]))
            .await
            .unwrap();

        assert_eq!(store.given("3").await.len(), 2);
        let received = store.received("2").await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].evaluator_id, "3");
        assert_eq!(received[0].average_rating(), Some(4.5));
        assert!(store.received("3").await.is_empty());
    }
}
