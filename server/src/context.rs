//! Renders retrieved records into the grounding block appended to the question.

use rag_core::RetrievedRecord;
use std::fmt::Write;

const MISSING: &str = "N/A";

/// Render `records` in ranked order, one template per record.
///
/// Each record is preceded by a blank line, so the block starts a new
/// paragraph after the question. No records renders as the empty string.
pub fn assemble(records: &[RetrievedRecord]) -> String {
    let mut block = String::new();
    for record in records {
        let metadata = &record.metadata;
        let stars = metadata
            .stars
            .map(|stars| stars.to_string())
            .unwrap_or_else(|| MISSING.to_string());

        // Writing to a String cannot fail
        let _ = write!(
            block,
            "\n\nReturned Results:\nProfessor: {}\nReview: {}\nSubject: {}\nStars: {}",
            record.id,
            metadata.review.as_deref().unwrap_or(MISSING),
            metadata.subject.as_deref().unwrap_or(MISSING),
            stars,
        );
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::RecordMetadata;

    fn record(id: &str, subject: &str, review: &str, stars: f64) -> RetrievedRecord {
        RetrievedRecord::new(
            id,
            0.9,
            RecordMetadata {
                subject: Some(subject.to_string()),
                review: Some(review.to_string()),
                stars: Some(stars),
                ..RecordMetadata::default()
            },
        )
    }

    #[test]
    fn test_empty_records() {
        assert_eq!(assemble(&[]), "");
    }

    #[test]
    fn test_single_record_template() {
        let block = assemble(&[record("Dr. Lee", "CS", "clear lectures", 5.0)]);
        assert_eq!(
            block,
            "\n\nReturned Results:\nProfessor: Dr. Lee\nReview: clear lectures\nSubject: CS\nStars: 5"
        );
    }

    #[test]
    fn test_records_keep_ranked_order() {
        let block = assemble(&[
            record("Dr. Lee", "CS", "clear lectures", 5.0),
            record("Prof. Kim", "Math", "hard exams", 3.5),
        ]);
        let lee = block.find("Dr. Lee").unwrap();
        let kim = block.find("Prof. Kim").unwrap();
        assert!(lee < kim);
        assert!(block.contains("Stars: 5\n\nReturned Results:\nProfessor: Prof. Kim"));
        assert!(block.ends_with("Stars: 3.5"));
    }

    #[test]
    fn test_missing_metadata() {
        let block = assemble(&[RetrievedRecord::new("Dr. Doe", 0.4, RecordMetadata::default())]);
        assert!(block.contains("Professor: Dr. Doe"));
        assert!(block.contains("Review: N/A"));
        assert!(block.contains("Subject: N/A"));
        assert!(block.contains("Stars: N/A"));
    }

    #[test]
    fn test_deterministic() {
        let records = vec![
            record("Dr. Lee", "CS", "clear lectures", 5.0),
            record("Prof. Kim", "Math", "hard exams", 3.0),
        ];
        assert_eq!(assemble(&records), assemble(&records));
    }
}
