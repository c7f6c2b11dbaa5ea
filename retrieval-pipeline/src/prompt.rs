use std::fmt::Write;

use crate::RetrievalResult;

/// Assembles the grounded prompt for a query. Pure and deterministic: the
/// same query and results always produce the identical string. Each result
/// gets a 1-based citation label (S1, S2, ...) in input order; truncation and
/// deduplication are the retrieval engine's responsibility, not done here.
pub fn build_grounded_prompt(query: &str, results: &[RetrievalResult]) -> String {
    let mut prompt = String::from("Context sources:\n\n");

    for (position, result) in results.iter().enumerate() {
        let label = position + 1;
        let _ = writeln!(
            prompt,
            "Source {label} (S{label}) [score {:.3}] {}",
            result.score, result.title
        );
        let _ = writeln!(prompt, "{}", result.text);
        let _ = writeln!(prompt, "URL: {}\n", result.url);
    }

    let _ = writeln!(
        prompt,
        "Answer the question using only the information in the sources above. \
         Cite the sources you rely on with their labels, e.g. [S1]. \
         If the sources do not contain the answer, say that you do not know."
    );
    let _ = write!(prompt, "\nQuestion: {query}");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f32, title: &str) -> RetrievalResult {
        RetrievalResult {
            score,
            title: title.to_owned(),
            text: format!("{title} body"),
            url: format!("https://news.example/{title}"),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_prompts() {
        let results = vec![result(0.9, "A"), result(0.4, "B")];
        let first = build_grounded_prompt("what moved?", &results);
        let second = build_grounded_prompt("what moved?", &results);
        assert_eq!(first, second);
    }

    #[test]
    fn labels_follow_input_order() {
        let results = vec![result(0.81, "A"), result(0.77, "B"), result(0.65, "C")];
        let prompt = build_grounded_prompt("What happened today in markets?", &results);

        let a = prompt.find("Source 1 (S1) [score 0.810] A").expect("S1 block");
        let b = prompt.find("Source 2 (S2) [score 0.770] B").expect("S2 block");
        let c = prompt.find("Source 3 (S3) [score 0.650] C").expect("S3 block");
        assert!(a < b && b < c);

        assert!(prompt.contains("using only the information in the sources above"));
        assert!(prompt.ends_with("Question: What happened today in markets?"));
    }

    #[test]
    fn no_results_still_yields_the_instruction_scaffold() {
        let prompt = build_grounded_prompt("anything?", &[]);
        assert!(prompt.contains("Context sources:"));
        assert!(prompt.contains("Question: anything?"));
        assert!(!prompt.contains("Source 1"));
    }
}
