//! Canonical abstraction of a singly-linked list, end to end: build a
//! concrete five-cell list, blur it down to head plus summary, join
//! structures at a "program point", and run a reachability query over
//! the abstract heap.
//!
//! Run with: `cargo run --example list-abstraction`

use std::rc::Rc;

use tvs_rs::assign::Assignment;
use tvs_rs::formula::Formula;
use tvs_rs::intern::{CanonicLevel, InternTables};
use tvs_rs::kleene::Kleene;
use tvs_rs::predicate::Vocabulary;
use tvs_rs::set::{structure_set, JoinMode};
use tvs_rs::structure::Structure;
use tvs_rs::variable::VarPool;

fn list(vocabulary: &Rc<Vocabulary>, cells: usize) -> Structure {
    let x = vocabulary.get("x").unwrap().clone();
    let next = vocabulary.get("next").unwrap().clone();
    let mut s = Structure::new(vocabulary.clone());
    let nodes: Vec<_> = (0..cells).map(|_| s.new_node().unwrap()).collect();
    s.update_unary(&x, nodes[0], Kleene::True);
    for pair in nodes.windows(2) {
        s.update_binary(&next, pair[0], pair[1], Kleene::True);
    }
    s
}

fn main() {
    let mut vocabulary = Vocabulary::new();
    vocabulary.create("x", 1, true).unwrap();
    let next = vocabulary.create("next", 2, false).unwrap();
    let vocabulary = Rc::new(vocabulary);

    let mut tables = InternTables::new(CanonicLevel::Renumber);

    // Every list of three or more cells blurs to the same abstract
    // structure (head cell plus one summary node), so the set stays
    // finite no matter how long the lists get.
    let mut point = structure_set(JoinMode::Exact);
    for cells in 2..=6 {
        let mut s = list(&vocabulary, cells);
        s.blur(&mut tables);
        let outcome = point.merge(s, &mut tables).unwrap();
        println!(
            "list of {} cells: {}",
            cells,
            if outcome.is_some() {
                "new abstract state"
            } else {
                "already covered"
            }
        );
    }
    println!("abstract states at this point: {}", point.len());

    // Reachability over the abstract heap: TC(sx, sy: next)(x, y),
    // asked of the member that contains a summary node.
    let sm = vocabulary.sm().clone();
    let abstracted = point
        .iter()
        .find(|s| s.nodes().any(|n| s.eval_unary(&sm, n) == Kleene::Unknown))
        .unwrap();
    let mut pool = VarPool::new();
    let vx = pool.var("vx");
    let vy = pool.var("vy");
    let sx = pool.var("sx");
    let sy = pool.var("sy");
    let body = Formula::predicate(next, vec![sx.clone(), sy.clone()]).unwrap();
    let reach = Formula::tc(vx.clone(), vy.clone(), sx, sy, body).unwrap();
    reach.prepare(abstracted);

    let x = vocabulary.get("x").unwrap().clone();
    let head = abstracted
        .nodes()
        .find(|&n| abstracted.eval_unary(&x, n) == Kleene::True)
        .unwrap();
    let summary = abstracted.nodes().find(|&n| n != head).unwrap();

    let mut assign = Assignment::new();
    assign.bind(vx.clone(), head);
    assign.bind(vy.clone(), summary);
    println!(
        "head reaches the summary node: {}",
        reach.eval(abstracted, &mut assign).unwrap()
    );
    assign.bind(vx, summary);
    assign.bind(vy, head);
    println!(
        "summary reaches the head:      {}",
        reach.eval(abstracted, &mut assign).unwrap()
    );
}
