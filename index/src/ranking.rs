use rag_core::RetrievedRecord;

/// Order records by descending score and keep at most `top_k`.
///
/// The sort is stable, so equal scores keep the order the index produced.
/// Records with a NaN score are dropped.
pub fn rank(mut records: Vec<RetrievedRecord>, top_k: usize) -> Vec<RetrievedRecord> {
    records.retain(|record| !record.similarity_score.is_nan());
    records.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    records.truncate(top_k);
    records
}

/// Cosine similarity of two equal-length vectors; 0.0 if either is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
