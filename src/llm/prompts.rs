//! Prompts for the quality judges and the re-ranker.
//!
//! Placeholders in braces (`{question}`, `{contexts}`, ...) are filled with
//! `str::replace` by the caller.

/// Collection of prompts used for judging and re-ranking.
pub struct Prompts;

impl Prompts {
    /// Are the retrieved contexts relevant to the question?
    pub fn context_precision() -> &'static str {
        r#"Evaluate the relevance of retrieved contexts for answering a question.

QUESTION: {question}

EXPECTED ANSWER: {expected_answer}

RETRIEVED CONTEXTS:
{contexts}

For each context, determine if it contains information relevant to answering the question correctly.

Rate the overall CONTEXT PRECISION from 0.0 to 1.0:
- 1.0 = All contexts are highly relevant and useful
- 0.5 = About half the contexts are relevant
- 0.0 = No contexts are relevant

Respond with ONLY a JSON object:
{"precision": <float>, "relevant_count": <int>, "reasoning": "<brief explanation>"}"#
    }

    /// Do the contexts hold every fact of the expected answer?
    pub fn context_recall() -> &'static str {
        r#"Evaluate if the retrieved contexts contain all information needed to generate the expected answer.

QUESTION: {question}

EXPECTED ANSWER: {expected_answer}

RETRIEVED CONTEXTS:
{contexts}

Steps:
1. Identify key facts in the expected answer
2. Check if each fact can be found in or inferred from the contexts

Rate the overall CONTEXT RECALL from 0.0 to 1.0:
- 1.0 = All facts from expected answer are present in contexts
- 0.5 = About half the facts are present
- 0.0 = No relevant facts are present

Respond with ONLY a JSON object:
{"recall": <float>, "facts_found": <int>, "total_facts": <int>, "reasoning": "<brief explanation>"}"#
    }

    /// Is the answer grounded in the contexts?
    pub fn faithfulness() -> &'static str {
        r#"Evaluate if an answer is faithful to (grounded in) the provided contexts.

QUESTION: {question}

ANSWER TO EVALUATE: {answer}

SOURCE CONTEXTS:
{contexts}

Check if all claims in the answer are supported by the contexts.
Identify any hallucinations (claims not supported by context).

Rate FAITHFULNESS from 0.0 to 1.0:
- 1.0 = All claims are fully supported by contexts, no hallucinations
- 0.5 = Some claims supported, some not verifiable
- 0.0 = Answer contains hallucinations or contradicts context

Respond with ONLY a JSON object:
{"faithfulness": <float>, "hallucinations": ["list any"], "reasoning": "<brief explanation>"}"#
    }

    /// Does the answer address the question?
    pub fn answer_relevancy() -> &'static str {
        r#"Evaluate if an answer directly and completely addresses the question asked.

QUESTION: {question}

ANSWER: {answer}

Evaluate:
1. Does it directly answer what was asked?
2. Is it complete (covers all aspects)?
3. Is it focused (no irrelevant information)?

Rate ANSWER RELEVANCY from 0.0 to 1.0:
- 1.0 = Answer directly and completely addresses the question
- 0.5 = Answer partially addresses the question
- 0.0 = Answer does not address the question

Respond with ONLY a JSON object:
{"relevancy": <float>, "addresses_question": <bool>, "reasoning": "<brief explanation>"}"#
    }

    /// Do two answers mean the same thing?
    pub fn semantic_similarity() -> &'static str {
        r#"Compare the semantic similarity of two answers.

EXPECTED ANSWER: {expected_answer}

GENERATED ANSWER: {answer}

Evaluate:
1. Do both convey the same key information?
2. Are there any contradictions?
3. Does generated capture the essence of expected?

Rate SEMANTIC SIMILARITY from 0.0 to 1.0:
- 1.0 = Perfect semantic match (same meaning)
- 0.5 = Partial overlap in meaning
- 0.0 = Completely different meaning

Respond with ONLY a JSON object:
{"similarity": <float>, "key_match": <bool>, "reasoning": "<brief explanation>"}"#
    }

    /// Score candidate documents 0-10 for a query.
    pub fn rerank() -> &'static str {
        r#"Score each document's relevance to the query (0-10). Return ONLY a JSON array of numbers.

Query: "{query}"

Documents:
{documents}

Return: [score1, score2, ...]"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judge_prompts_name_their_score_key() {
        assert!(Prompts::context_precision().contains(r#""precision""#));
        assert!(Prompts::context_recall().contains(r#""recall""#));
        assert!(Prompts::faithfulness().contains(r#""faithfulness""#));
        assert!(Prompts::answer_relevancy().contains(r#""relevancy""#));
        assert!(Prompts::semantic_similarity().contains(r#""similarity""#));
    }

    #[test]
    fn test_rerank_placeholders() {
        let prompt = Prompts::rerank();
        assert!(prompt.contains("{query}"));
        assert!(prompt.contains("{documents}"));
    }
}
