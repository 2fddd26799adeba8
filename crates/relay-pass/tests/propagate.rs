//! End-to-end propagation through the dispatcher with fixture layers.

use relay_core::{SparseTensor, Tensor};
use relay_pass::{
    Aggregation, ConfigError, Connectivity, DispatchConfig, Dispatcher, Flow, Hook, Kwargs,
    PropagateError, Representation, Size, Strategy,
};
use relay_test_utils::fixtures::{
    ConstMessage, CopySource, DenseCopy, EdgeValues, FailingLayer, FusedCopy, PartialCopy,
    UpdatingLayer,
};
use relay_test_utils::{adj_t, dense_adj_t, edge_list, random_edge_list, random_features, triangle};

const NODES: usize = 20;
const EDGES: usize = 70;

fn cfg(aggr: Aggregation, format: Option<Strategy>) -> DispatchConfig {
    DispatchConfig {
        aggr,
        format,
        ..DispatchConfig::default()
    }
}

fn features() -> Kwargs {
    Kwargs::new().with("x", random_features(3, NODES, 4))
}

// ── Scenarios ──────────────────────────────────────────────────────

#[test]
fn unit_messages_sum_to_in_degree() {
    let d = Dispatcher::new(ConstMessage::new(1.0), DispatchConfig::default()).unwrap();
    let out = d
        .propagate(&triangle().into(), Some(Size::square(3)), &Kwargs::new())
        .unwrap();
    assert_eq!(out.to_vec().unwrap(), &[1.0, 1.0, 1.0]);
    assert_eq!(
        d.resolved_strategy(Representation::EdgeIndex),
        Some(Strategy::Sparse)
    );
}

#[test]
fn mean_of_single_incoming_message() {
    let d = Dispatcher::new(EdgeValues, DispatchConfig::with_aggr(Aggregation::Mean)).unwrap();
    let kwargs = Kwargs::new().with("values", Tensor::from_vec(vec![2.0, 4.0, 6.0]).unwrap());
    let out = d
        .propagate(&triangle().into(), Some(Size::square(3)), &kwargs)
        .unwrap();
    assert_eq!(out.to_vec().unwrap(), &[6.0, 2.0, 4.0]);
}

#[test]
fn sparse_adjacency_prefers_fused_hook() {
    let d = Dispatcher::new(FusedCopy::new(), DispatchConfig::default()).unwrap();
    let adj = Connectivity::Sparse(adj_t(&triangle(), 3));
    let kwargs = Kwargs::new().with("x", Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap());
    let out = d.propagate(&adj, None, &kwargs).unwrap();
    assert_eq!(out.to_vec().unwrap(), &[3.0, 1.0, 2.0]);
    assert_eq!(
        d.resolved_strategy(Representation::SparseAdj),
        Some(Strategy::Fused)
    );
    assert_eq!(d.layer().fused_calls(), 1);
    assert_eq!(d.layer().message_calls(), 0);
}

#[test]
fn explicit_format_overrides_preference() {
    let d = Dispatcher::new(FusedCopy::new(), cfg(Aggregation::Add, Some(Strategy::Sparse))).unwrap();
    let adj = Connectivity::Sparse(adj_t(&triangle(), 3));
    let kwargs = Kwargs::new().with("x", Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap());
    let out = d.propagate(&adj, None, &kwargs).unwrap();
    assert_eq!(out.to_vec().unwrap(), &[3.0, 1.0, 2.0]);
    assert_eq!(d.layer().fused_calls(), 0);
    assert_eq!(d.layer().message_calls(), 1);
}

#[test]
fn strategy_is_resolved_once_per_representation() {
    let d = Dispatcher::new(FusedCopy::new(), DispatchConfig::default()).unwrap();
    let kwargs = Kwargs::new().with("x", Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap());
    let adj = Connectivity::Sparse(adj_t(&triangle(), 3));
    for _ in 0..3 {
        d.propagate(&adj, None, &kwargs).unwrap();
        d.propagate(&triangle().into(), None, &kwargs).unwrap();
    }
    assert_eq!(d.layer().fused_calls(), 3);
    assert_eq!(d.layer().message_calls(), 3);
    assert_eq!(d.resolved_strategy(Representation::DenseAdj), None);
}

// ── Strategy agreement ─────────────────────────────────────────────

fn edge_list_reference(aggr: Aggregation) -> Tensor {
    let d = Dispatcher::new(CopySource, DispatchConfig::with_aggr(aggr)).unwrap();
    let edges = random_edge_list(11, NODES, EDGES);
    d.propagate(&edges.into(), None, &features()).unwrap()
}

#[test]
fn fused_and_sparse_paths_agree_with_edge_list() {
    let expected = edge_list_reference(Aggregation::Add);
    let adj = Connectivity::Sparse(adj_t(&random_edge_list(11, NODES, EDGES), NODES));

    let fused = Dispatcher::new(FusedCopy::new(), DispatchConfig::default()).unwrap();
    assert!(fused.propagate(&adj, None, &features()).unwrap().approx_eq(&expected, 1e-5));

    let sparse = Dispatcher::new(CopySource, DispatchConfig::default()).unwrap();
    assert!(sparse.propagate(&adj, None, &features()).unwrap().approx_eq(&expected, 1e-5));

    let dense = Dispatcher::new(DenseCopy, DispatchConfig::default()).unwrap();
    let matrix = Connectivity::Dense(dense_adj_t(&random_edge_list(11, NODES, EDGES), NODES));
    assert!(dense.propagate(&matrix, None, &features()).unwrap().approx_eq(&expected, 1e-5));
}

#[test]
fn partial_bins_agree_with_edge_list() {
    let adj = Connectivity::Sparse(adj_t(&random_edge_list(11, NODES, EDGES), NODES));
    for aggr in [Aggregation::Add, Aggregation::Mean, Aggregation::Max] {
        let expected = edge_list_reference(aggr);
        for (max_deg, binning) in [(None, true), (None, false), (Some(2), true), (Some(3), false)] {
            let config = DispatchConfig {
                partial_max_deg: max_deg,
                partial_binning: binning,
                ..cfg(aggr, Some(Strategy::Partial))
            };
            let d = Dispatcher::new(PartialCopy, config).unwrap();
            let out = d.propagate(&adj, None, &features()).unwrap();
            assert!(
                out.approx_eq(&expected, 1e-5),
                "{aggr} with max_deg {max_deg:?}, binning {binning}"
            );
        }
    }
}

#[test]
fn dense_partial_weights_by_entry_value() {
    let edges = random_edge_list(11, NODES, EDGES);
    let expected = edge_list_reference(Aggregation::Add);
    let d = Dispatcher::new(PartialCopy, cfg(Aggregation::Add, Some(Strategy::Partial))).unwrap();
    let out = d
        .propagate(&Connectivity::Dense(dense_adj_t(&edges, NODES)), None, &features())
        .unwrap();
    assert!(out.approx_eq(&expected, 1e-5));
}

#[test]
fn consistency_check_covers_both_sparse_paths() {
    let d = Dispatcher::new(FusedCopy::new(), DispatchConfig::default()).unwrap();
    let adj = adj_t(&random_edge_list(5, NODES, EDGES), NODES);
    assert_eq!(d.check_propagate_consistency(&adj, None, &features()), Ok(true));
    assert_eq!(d.resolved_strategy(Representation::SparseAdj), None);

    let copy = Dispatcher::new(CopySource, DispatchConfig::default()).unwrap();
    assert_eq!(
        copy.check_propagate_consistency(&adj, None, &features()),
        Err(PropagateError::UnsupportedFormat {
            representation: Representation::SparseAdj,
            requested: Some(Strategy::Fused),
        })
    );
}

// ── Flow and explain ───────────────────────────────────────────────

#[test]
fn reversed_flow_matches_transposed_edges() {
    let edges = random_edge_list(2, NODES, EDGES);
    let source: Vec<i64> = edges.row(0).unwrap().to_vec();
    let target: Vec<i64> = edges.row(1).unwrap().to_vec();
    let flipped = edge_list(&target, &source);

    let forward = Dispatcher::new(CopySource, DispatchConfig::default()).unwrap();
    let reverse = Dispatcher::new(
        CopySource,
        DispatchConfig {
            flow: Flow::TargetToSource,
            ..DispatchConfig::default()
        },
    )
    .unwrap();
    let a = reverse.propagate(&edges.into(), None, &features()).unwrap();
    let b = forward.propagate(&flipped.into(), None, &features()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn edge_mask_is_padded_for_self_loops() {
    // Triangle plus one self-loop per node, appended after the masked edges.
    let edges = edge_list(&[0, 1, 2, 0, 1, 2], &[1, 2, 0, 0, 1, 2]);
    let mut d = Dispatcher::new(CopySource, DispatchConfig::default()).unwrap();
    d.set_edge_mask(vec![0.0; 3]);
    let kwargs = Kwargs::new().with("x", Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap());
    let out = d.propagate(&edges.into(), None, &kwargs).unwrap();
    assert!(out.approx_eq(&Tensor::from_vec(vec![2.5, 2.5, 4.0]).unwrap(), 1e-6));
}

#[test]
fn explain_mode_rejects_dense_input() {
    let mut d = Dispatcher::new(DenseCopy, DispatchConfig::default()).unwrap();
    d.set_edge_mask(vec![0.0; 3]);
    let dense = Connectivity::Dense(dense_adj_t(&triangle(), 3));
    assert!(matches!(
        d.propagate(&dense, None, &Kwargs::new().with("x", Tensor::zeros(&[3, 1]).unwrap())),
        Err(PropagateError::Configuration(ConfigError::ExplainUnsupported { .. }))
    ));
}

// ── Failures ───────────────────────────────────────────────────────

#[test]
fn update_hook_is_rejected_at_construction() {
    assert!(matches!(
        Dispatcher::new(UpdatingLayer, DispatchConfig::default()),
        Err(ConfigError::ForbiddenHook { hook: Hook::Update })
    ));
}

#[test]
fn hook_failures_name_the_hook() {
    let d = Dispatcher::new(FailingLayer, DispatchConfig::default()).unwrap();
    let kwargs = Kwargs::new().with("x", Tensor::zeros(&[3]).unwrap());
    assert_eq!(
        d.propagate(&triangle().into(), None, &kwargs),
        Err(PropagateError::HookFailed {
            hook: Hook::Message,
            reason: "deliberate failure".into(),
        })
    );
}

#[test]
fn dense_input_without_dense_hooks_is_unsupported() {
    let d = Dispatcher::new(CopySource, DispatchConfig::default()).unwrap();
    let dense = Connectivity::Dense(dense_adj_t(&triangle(), 3));
    assert!(matches!(
        d.propagate(&dense, None, &Kwargs::new()),
        Err(PropagateError::UnsupportedFormat {
            representation: Representation::DenseAdj,
            ..
        })
    ));
}

#[test]
fn shared_dispatcher_across_threads() {
    let d = Dispatcher::new(FusedCopy::new(), DispatchConfig::default()).unwrap();
    let adj: Connectivity = SparseTensor::adj_t_from_edge_index(
        &random_edge_list(9, NODES, EDGES),
        None,
        NODES,
    )
    .unwrap()
    .into();
    let expected = d.propagate(&adj, None, &features()).unwrap();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let out = d.propagate(&adj, None, &features()).unwrap();
                assert_eq!(out, expected);
            });
        }
    });
    assert_eq!(d.layer().fused_calls(), 5);
}
