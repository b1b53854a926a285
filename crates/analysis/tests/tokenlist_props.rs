//! Property tests for the token-list link invariants: any sequence of
//! insertions, deletions, swaps and erasures keeps the chain and the
//! mutual bracket links consistent.

use proptest::prelude::*;

use ccheck_analysis::tokens::{Language, Token, TokenData, TokenList};

#[derive(Clone, Debug)]
enum Op {
    InsertAfter(usize),
    InsertBefore(usize),
    DeleteNext(usize),
    DeletePrev(usize),
    SwapWithNext(usize),
    Erase(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..64).prop_map(Op::InsertAfter),
        (0usize..64).prop_map(Op::InsertBefore),
        (0usize..64).prop_map(Op::DeleteNext),
        (0usize..64).prop_map(Op::DeletePrev),
        (0usize..64).prop_map(Op::SwapWithNext),
        (0usize..64).prop_map(Op::Erase),
    ]
}

fn chain(list: &TokenList) -> Vec<Token> {
    list.tokens().collect()
}

fn build_list(n: usize) -> TokenList {
    let mut list = TokenList::new(Language::Cpp);
    let mut opens = Vec::new();
    for i in 0..n {
        let tok = list.push_back(TokenData::new(format!("t{i}")));
        // Sprinkle some bracket pairs through the list.
        if i % 4 == 0 {
            opens.push(tok);
        } else if i % 4 == 2 {
            if let Some(open) = opens.pop() {
                list.create_mutual_links(open, tok);
            }
        }
    }
    list
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_mutations_preserve_invariants(
        len in 4usize..24,
        ops in proptest::collection::vec(op_strategy(), 1..32),
    ) {
        let mut list = build_list(len);
        for op in ops {
            let toks = chain(&list);
            if toks.is_empty() {
                break;
            }
            match op {
                Op::InsertAfter(i) => {
                    let tok = toks[i % toks.len()];
                    list.insert(tok, "new", false);
                }
                Op::InsertBefore(i) => {
                    let tok = toks[i % toks.len()];
                    list.insert(tok, "new", true);
                }
                Op::DeleteNext(i) => {
                    let tok = toks[i % toks.len()];
                    list.delete_next(tok, 1);
                }
                Op::DeletePrev(i) => {
                    let tok = toks[i % toks.len()];
                    list.delete_prev(tok, 1);
                }
                Op::SwapWithNext(i) => {
                    let tok = toks[i % toks.len()];
                    if list.next(tok).is_some() {
                        list.swap_with_next(tok).unwrap();
                    }
                }
                Op::Erase(i) => {
                    let tok = toks[i % toks.len()];
                    list.erase(tok);
                }
            }
            // The chain and link-pair invariants hold after every mutation.
            list.check_chain().unwrap();
        }
    }
}
