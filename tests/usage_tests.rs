// Usage accounting invariants
// Author: kelexine (https://github.com/kelexine)

use gemcache::cache::{CachePlan, MIN_CACHE_TOKENS};
use gemcache::models::gemini::UsageMetadata;
use gemcache::session::report::{render, BLOCK_SEPARATOR};
use gemcache::session::{QueryKind, QueryRecord, TokenUsage, UsageLedger};
use proptest::prelude::*;

fn metadata() -> impl Strategy<Value = UsageMetadata> {
    (
        proptest::option::of(0u32..1_000_000),
        proptest::option::of(0u32..2_000_000),
        proptest::option::of(0u32..100_000),
        proptest::option::of(0u32..100_000),
        proptest::option::of(0u32..10_000),
    )
        .prop_map(|(prompt, cached, candidates, thoughts, tool)| UsageMetadata {
            prompt_token_count: prompt,
            cached_content_token_count: cached,
            candidates_token_count: candidates,
            thoughts_token_count: thoughts,
            tool_use_prompt_token_count: tool,
            total_token_count: None,
        })
}

proptest! {
    #[test]
    fn usage_total_is_input_plus_output(meta in metadata()) {
        let usage = TokenUsage::from_metadata(&meta);
        prop_assert_eq!(usage.total_tokens, usage.input_tokens + usage.output_tokens);
        prop_assert!(usage.cached_tokens <= usage.input_tokens);
    }

    #[test]
    fn ledger_preserves_invariants(metas in proptest::collection::vec(metadata(), 0..20)) {
        let mut ledger = UsageLedger::new();
        let mut input = 0u64;
        let mut output = 0u64;
        for meta in &metas {
            let usage = TokenUsage::from_metadata(meta);
            input += usage.input_tokens;
            output += usage.output_tokens;
            ledger.record(&usage);
        }

        let totals = ledger.totals();
        prop_assert_eq!(totals.input_tokens, input);
        prop_assert_eq!(totals.output_tokens, output);
        prop_assert_eq!(totals.total_tokens, input + output);
        prop_assert!(totals.cached_tokens <= totals.input_tokens);
        prop_assert_eq!(ledger.queries(), metas.len());
    }

    #[test]
    fn threshold_routes_small_content_to_fallback(tokens in 0u32..100_000) {
        let plan = CachePlan::decide(tokens, MIN_CACHE_TOKENS);
        prop_assert_eq!(plan.is_explicit(), tokens >= MIN_CACHE_TOKENS);
        prop_assert_eq!(plan.tokens(), tokens);
    }

    #[test]
    fn report_keeps_every_pair_in_order(
        pairs in proptest::collection::vec(("[a-z][a-z ]{0,30}", "[A-Za-z0-9 .]{0,60}"), 1..8)
    ) {
        let records: Vec<QueryRecord> = pairs
            .iter()
            .map(|(prompt, answer)| QueryRecord {
                prompt: prompt.clone(),
                answer: Some(answer.clone()),
                mode: QueryKind::Implicit,
                usage: Some(TokenUsage::new(10, 0, 1)),
            })
            .collect();
        let mut ledger = UsageLedger::new();
        for r in &records {
            ledger.record(r.usage.as_ref().unwrap());
        }

        let report = render(&records, &ledger, 0.75);
        let blocks: Vec<&str> = report.split(BLOCK_SEPARATOR).collect();

        prop_assert_eq!(blocks.len(), records.len() + 1);
        for (block, (prompt, answer)) in blocks.iter().zip(&pairs) {
            let expected = format!("### [implicit] {}\n{}\n", prompt, answer);
            prop_assert_eq!(*block, expected.as_str());
        }
        prop_assert!(blocks[records.len()].starts_with("## Usage summary"));
    }
}

#[test]
fn test_cached_exceeding_prompt_is_clamped() {
    let meta = UsageMetadata {
        prompt_token_count: Some(100),
        cached_content_token_count: Some(4096),
        ..Default::default()
    };
    let usage = TokenUsage::from_metadata(&meta);
    assert_eq!(usage.cached_tokens, 100);
}

#[test]
fn test_savings_without_input() {
    let ledger = UsageLedger::new();
    let savings = ledger.estimated_savings(0.75);
    assert_eq!(savings.cached_tokens, 0);
    assert_eq!(savings.cached_share_pct, 0.0);
}
