//! Connection graph tests: single-writer semantics, batched edits and
//! message-plug registries.

use scenekit::prelude::*;

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[test]
fn force_connect_replaces_the_writer() {
    init_logging();
    let mut g = SceneGraph::new();
    let a = g.create_dg_node("a", "network").unwrap();
    let b = g.create_dg_node("b", "network").unwrap();
    let sink = g.create_dg_node("sink", "network").unwrap();
    let out_a = g.add_attribute(a, &AttrSpec::new("out", AttrType::Double)).unwrap();
    let out_b = g.add_attribute(b, &AttrSpec::new("out", AttrType::Double)).unwrap();
    let inp = g.add_attribute(sink, &AttrSpec::new("inp", AttrType::Double)).unwrap();

    g.connect(&out_a, &inp, false, None).unwrap();
    assert!(matches!(
        g.connect(&out_b, &inp, false, None),
        Err(Error::ConnectionConflict { .. })
    ));
    g.connect(&out_b, &inp, true, None).unwrap();

    // exactly one writer, and the loser lost its fan-out entry
    assert_eq!(g.source_of(&inp).unwrap(), Some(out_b.clone()));
    assert!(g.destinations_of(&out_a).unwrap().is_empty());

    // reconnecting the same edge is a no-op, not a conflict
    g.connect(&out_b, &inp, false, None).unwrap();
    assert_eq!(g.destinations_of(&out_b).unwrap().len(), 1);
}

#[test]
fn fan_out_is_unbounded() {
    init_logging();
    let mut g = SceneGraph::new();
    let src = g.create_dg_node("src", "network").unwrap();
    let out = g.add_attribute(src, &AttrSpec::new("out", AttrType::Double)).unwrap();
    let mut sinks = Vec::new();
    for i in 0..4 {
        let n = g.create_dg_node(&format!("sink{i}"), "network").unwrap();
        let inp = g.add_attribute(n, &AttrSpec::new("inp", AttrType::Double)).unwrap();
        g.connect(&out, &inp, false, None).unwrap();
        sinks.push(inp);
    }
    assert_eq!(g.destinations_of(&out).unwrap(), sinks);
    let pairs = g.iter_connections(src, false, true).unwrap();
    assert_eq!(pairs.len(), 4);
    assert!(pairs.iter().all(|(near, _)| *near == out));
}

#[test]
fn batched_edits_apply_atomically_in_order() {
    init_logging();
    let mut g = SceneGraph::new();
    let a = g.create_dg_node("a", "network").unwrap();
    let b = g.create_dg_node("b", "network").unwrap();
    let out = g.add_attribute(a, &AttrSpec::new("out", AttrType::Double)).unwrap();
    let inp = g.add_attribute(b, &AttrSpec::new("inp", AttrType::Double)).unwrap();

    let mut batch = EditBatch::new();
    g.connect(&out, &inp, false, Some(&mut batch)).unwrap();
    assert_eq!(g.source_of(&inp).unwrap(), None);

    batch.apply(&mut g).unwrap();
    assert_eq!(g.source_of(&inp).unwrap(), Some(out.clone()));

    // disconnect queued after a conflicting connect still wins
    let c = g.create_dg_node("c", "network").unwrap();
    let out_c = g.add_attribute(c, &AttrSpec::new("out", AttrType::Double)).unwrap();
    let mut batch = EditBatch::new();
    g.connect(&out_c, &inp, true, Some(&mut batch)).unwrap();
    g.disconnect(&inp, true, false, Some(&mut batch)).unwrap();
    batch.apply(&mut g).unwrap();
    assert_eq!(g.source_of(&inp).unwrap(), None);
}

#[test]
fn message_array_collects_members() {
    init_logging();
    let mut g = SceneGraph::new();
    let meta = g.create_dg_node("meta", "network").unwrap();
    let members = g
        .add_attribute(meta, &AttrSpec::new("members", AttrType::Message).array(true))
        .unwrap();

    let mut ctrls = Vec::new();
    for name in ["hips", "chest", "head"] {
        let ctrl = g.create_dag_node(name, "transform", None).unwrap();
        let slot = g.next_available_element_plug(&members).unwrap();
        g.connect(&Plug::new(ctrl, "message"), &slot, false, None).unwrap();
        ctrls.push(ctrl);
    }
    assert_eq!(g.element_indices(&members).unwrap(), vec![0, 1, 2]);
    let incoming = g.iter_connections(meta, true, false).unwrap();
    let sources: Vec<NodeId> = incoming.iter().map(|(_, far)| far.node).collect();
    assert_eq!(sources, ctrls);

    // deleting a member breaks its edge; the slot frees up
    g.delete(ctrls[1]).unwrap();
    assert_eq!(g.iter_connections(meta, true, false).unwrap().len(), 2);
    let free = g.next_available_element_plug(&members).unwrap();
    assert_eq!(free, members.element(1));
}

#[test]
fn vector_connect_respects_axis_mask() {
    init_logging();
    let mut g = SceneGraph::new();
    let src = g.create_dag_node("src", "transform", None).unwrap();
    let dst = g.create_dag_node("dst", "transform", None).unwrap();
    let st = g.find_plug(src, "translate").unwrap();
    let dt = g.find_plug(dst, "translate").unwrap();

    g.connect_vector(&st, &dt, &[true, true, false], false, None).unwrap();
    assert!(g.source_of(&dt.child_at(0)).unwrap().is_some());
    assert!(g.source_of(&dt.child_at(1)).unwrap().is_some());
    assert!(g.source_of(&dt.child_at(2)).unwrap().is_none());

    // flipping an axis off breaks that child's edge
    g.connect_vector(&st, &dt, &[true, false, false], false, None).unwrap();
    assert!(g.source_of(&dt.child_at(1)).unwrap().is_none());
}

#[test]
fn compound_fast_path_matches_per_child_connects() {
    init_logging();
    // one graph wired through the compound fast path
    let mut fast = SceneGraph::new();
    let src = fast.create_dag_node("src", "transform", None).unwrap();
    let dst = fast.create_dag_node("dst", "transform", None).unwrap();
    let st = fast.find_plug(src, "translate").unwrap();
    let dt = fast.find_plug(dst, "translate").unwrap();
    fast.connect_vector(&st, &dt, &[true, true, true], false, None).unwrap();

    // another wired child by child
    let mut slow = SceneGraph::new();
    let src2 = slow.create_dag_node("src", "transform", None).unwrap();
    let dst2 = slow.create_dag_node("dst", "transform", None).unwrap();
    let st2 = slow.find_plug(src2, "translate").unwrap();
    let dt2 = slow.find_plug(dst2, "translate").unwrap();
    for i in 0..3 {
        slow.connect(&st2.child_at(i), &dt2.child_at(i), false, None).unwrap();
    }

    // every child reads as driven by the same source in both graphs
    for i in 0..3 {
        assert_eq!(
            fast.effective_source_of(&dt.child_at(i)).unwrap(),
            Some(st.child_at(i))
        );
        assert_eq!(
            slow.effective_source_of(&dt2.child_at(i)).unwrap(),
            Some(st2.child_at(i))
        );
    }
}

#[test]
fn swap_moves_filtered_outgoing_edges() {
    init_logging();
    let mut g = SceneGraph::new();
    let old = g.create_dg_node("old", "network").unwrap();
    let new = g.create_dg_node("new", "network").unwrap();
    let s1 = g.create_dg_node("s1", "network").unwrap();
    let s2 = g.create_dg_node("s2", "network").unwrap();
    for n in [old, new] {
        g.add_attribute(n, &AttrSpec::new("outA", AttrType::Double)).unwrap();
        g.add_attribute(n, &AttrSpec::new("outB", AttrType::Double)).unwrap();
    }
    let in1 = g.add_attribute(s1, &AttrSpec::new("inp", AttrType::Double)).unwrap();
    let in2 = g.add_attribute(s2, &AttrSpec::new("inp", AttrType::Double)).unwrap();
    let old_a = g.find_plug(old, "outA").unwrap();
    let old_b = g.find_plug(old, "outB").unwrap();
    g.connect(&old_a, &in1, false, None).unwrap();
    g.connect(&old_b, &in2, false, None).unwrap();

    g.swap_outgoing_connections(old, new, Some(&[old_a.clone()])).unwrap();
    assert_eq!(
        g.source_of(&in1).unwrap(),
        Some(g.find_plug(new, "outA").unwrap())
    );
    // the unfiltered edge stayed put
    assert_eq!(g.source_of(&in2).unwrap(), Some(old_b));
}

#[test]
fn deleting_a_node_leaves_survivors_editable() {
    init_logging();
    let mut g = SceneGraph::new();
    let driver = g.create_dg_node("driver", "network").unwrap();
    let driven = g.create_dg_node("driven", "network").unwrap();
    let out = g.add_attribute(driver, &AttrSpec::new("out", AttrType::Double)).unwrap();
    let inp = g.add_attribute(driven, &AttrSpec::new("inp", AttrType::Double)).unwrap();
    g.connect(&out, &inp, false, None).unwrap();
    g.set_locked(&inp, true).unwrap();
    g.lock_node(driver, true).unwrap();

    // delete unlocks the node itself and the surviving far ends
    g.delete(driver).unwrap();
    assert!(!g.is_valid(driver));
    assert_eq!(g.source_of(&inp).unwrap(), None);
    g.set_plug_value(&inp, Value::Double(5.0)).unwrap();

    // a stale handle fails cleanly everywhere
    assert!(matches!(g.node(driver), Err(Error::NodeNotFound(_))));
    assert!(g.find_plug(driver, "out").is_err());
}
