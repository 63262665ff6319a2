//! Sentence chain planning and verification
//!
//! The store reserves a block of sids for a batch; everything else about a
//! batch (sid arithmetic and link assignment) is computed here so it can be
//! tested without a database.

use crate::error::{ChainError, Result};
use crate::models::{Cid, NewSentence, ParsedFragment, Sentence};

/// Assign sids and links to a parsed batch that starts at `start_sid`.
///
/// The first sentence links back to `start_sid - 1` when the chain already
/// has a tail; the store is responsible for pointing that tail's `nsid` at
/// `start_sid`. The last sentence of the batch has no `nsid`.
pub fn plan_batch(cid: Cid, start_sid: u32, fragments: Vec<ParsedFragment>) -> Result<Vec<NewSentence>> {
    if fragments.is_empty() {
        return Ok(Vec::new());
    }
    let count = u32::try_from(fragments.len())
        .map_err(|_| ChainError::Validation("Batch is too large".to_string()))?;
    let last_sid = start_sid
        .checked_add(count)
        .and_then(|end| end.checked_sub(1))
        .ok_or_else(|| ChainError::Validation("Sentence id space exhausted".to_string()))?;

    Ok(fragments
        .into_iter()
        .zip(start_sid..)
        .map(|(fragment, sid)| NewSentence {
            cid,
            sid,
            psid: sid.checked_sub(1),
            nsid: (sid < last_sid).then(|| sid + 1),
            kind: fragment.kind,
            content: fragment.content,
        })
        .collect())
}

/// Check that a full chain is gapless and consistently linked
pub fn verify_chain(sentences: &[Sentence]) -> Result<()> {
    let last = sentences.len().checked_sub(1);
    for (idx, sentence) in sentences.iter().enumerate() {
        let expected = u32::try_from(idx)
            .map_err(|_| ChainError::Integrity("Chain is too long".to_string()))?;
        if sentence.sid != expected {
            return Err(ChainError::Integrity(format!(
                "concept {}: expected sid {expected}, found {}",
                sentence.cid, sentence.sid
            )));
        }

        let psid = expected.checked_sub(1);
        if sentence.psid != psid {
            return Err(ChainError::Integrity(format!(
                "concept {} sid {expected}: psid is {:?}, expected {psid:?}",
                sentence.cid, sentence.psid
            )));
        }

        let nsid = (Some(idx) != last).then(|| expected + 1);
        if sentence.nsid != nsid {
            return Err(ChainError::Integrity(format!(
                "concept {} sid {expected}: nsid is {:?}, expected {nsid:?}",
                sentence.cid, sentence.nsid
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::models::FragmentKind;

    fn cid() -> Cid {
        Cid::parse("w").expect("cid")
    }

    fn fragments(count: usize) -> Vec<ParsedFragment> {
        (0..count)
            .map(|position| ParsedFragment {
                cid: cid(),
                position,
                kind: FragmentKind::Paragraph,
                content: format!("p{position}"),
            })
            .collect()
    }

    fn persisted(planned: Vec<NewSentence>) -> Vec<Sentence> {
        planned
            .into_iter()
            .map(|s| Sentence {
                cid: s.cid,
                sid: s.sid,
                psid: s.psid,
                nsid: s.nsid,
                kind: s.kind,
                content: s.content,
                published_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_first_batch_starts_at_head() {
        let planned = plan_batch(cid(), 0, fragments(3)).expect("plan");
        let links: Vec<_> = planned.iter().map(|s| (s.sid, s.psid, s.nsid)).collect();
        assert_eq!(links, vec![(0, None, Some(1)), (1, Some(0), Some(2)), (2, Some(1), None)]);
    }

    #[test]
    fn test_appended_batch_links_to_prior_tail() {
        let planned = plan_batch(cid(), 4, fragments(1)).expect("plan");
        assert_eq!(planned[0].sid, 4);
        assert_eq!(planned[0].psid, Some(3));
        assert_eq!(planned[0].nsid, None);
        assert_eq!(planned[0].content, "p0");
    }

    #[test]
    fn test_empty_batch_plans_nothing() {
        assert!(plan_batch(cid(), 0, Vec::new()).expect("plan").is_empty());
    }

    #[test]
    fn test_sid_overflow_is_rejected() {
        assert!(plan_batch(cid(), u32::MAX, fragments(2)).is_err());
    }

    #[test]
    fn test_verify_reports_gap() {
        let mut chain = persisted(plan_batch(cid(), 0, fragments(3)).expect("plan"));
        chain.remove(1);
        let err = verify_chain(&chain).expect_err("gap");
        assert!(matches!(err, ChainError::Integrity(_)));
    }

    #[test]
    fn test_verify_reports_dangling_tail_link() {
        let mut chain = persisted(plan_batch(cid(), 0, fragments(2)).expect("plan"));
        chain[1].nsid = Some(2);
        assert!(verify_chain(&chain).is_err());
    }

    proptest! {
        #[test]
        fn prop_consecutive_batches_form_valid_chain(sizes in prop::collection::vec(1usize..8, 1..6)) {
            let mut chain = Vec::new();
            for size in sizes {
                let start = u32::try_from(chain.len()).expect("fits");
                if let Some(tail) = chain.last_mut() {
                    let tail: &mut Sentence = tail;
                    tail.nsid = Some(start);
                }
                chain.extend(persisted(plan_batch(cid(), start, fragments(size)).expect("plan")));
            }
            prop_assert!(verify_chain(&chain).is_ok());
        }
    }
}
