use anyhow::Result;
use scenegraph_core::{
    DsgLayers, DynamicSceneGraph, EdgeKey, LayerPrefix, MergeOptions, MergeSummary, MeshVertex,
    NodeInfo, Point3,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn at(x: f64) -> Box<dyn scenegraph_core::NodeAttributes> {
    NodeInfo::boxed(Point3::new(x, 0.0, 0.0))
}

fn counts(graph: &DynamicSceneGraph) -> (usize, usize, usize, usize) {
    (
        graph.num_nodes(),
        graph.num_edges(),
        graph.num_dynamic_nodes(),
        graph.num_mesh_edges(),
    )
}

/// Remote graph with a parent edge, an intralayer edge, a robot trajectory
/// and a mesh edge.
fn remote_graph() -> Result<DynamicSceneGraph> {
    let mut graph = DynamicSceneGraph::default();
    graph.emplace_node(DsgLayers::ROOMS, 100, at(0.0))?;
    graph.emplace_node(DsgLayers::PLACES, 1, at(1.0))?;
    graph.emplace_node(DsgLayers::PLACES, 2, at(2.0))?;
    graph.insert_edge(100, 1, None)?;
    graph.insert_edge(1, 2, None)?;

    let robot = LayerPrefix::new('a');
    for step in 0..3u64 {
        graph.emplace_dynamic_node(
            DsgLayers::AGENTS,
            robot,
            Duration::from_secs(step),
            at(step as f64),
            true,
        )?;
    }
    graph.insert_edge(2, robot.make_id(0), None)?;

    graph.set_mesh(
        Arc::new(vec![MeshVertex::new(0.0, 0.0, 0.0); 4]),
        Arc::new(Vec::new()),
        false,
    );
    graph.insert_mesh_edge(1, 3, false)?;
    Ok(graph)
}

#[test]
fn test_merge_into_empty_graph() -> Result<()> {
    let remote = remote_graph()?;
    let mut local = DynamicSceneGraph::default();

    let options = MergeOptions {
        allow_invalid_mesh: true,
        ..MergeOptions::default()
    };
    let summary = local.merge_graph(&remote, &options);

    assert_eq!(
        summary,
        MergeSummary {
            nodes_added: 3,
            dynamic_nodes_added: 3,
            nodes_removed: 0,
            interlayer_edges_added: 2,
            mesh_edges_added: 1,
        }
    );
    assert_eq!(local.get_node(1).unwrap().parent(), Some(100));
    assert!(local.has_edge(1, 2));
    assert!(local.has_edge(2, LayerPrefix::new('a').make_id(0)));
    assert!(local.has_edge(LayerPrefix::new('a').make_id(1), LayerPrefix::new('a').make_id(2)));
    assert!(local.has_mesh_edge(1, 3));
    // the mesh itself is not part of a merge
    assert!(!local.has_mesh());
    Ok(())
}

#[test]
fn test_merge_without_mesh_rejects_mesh_edges() -> Result<()> {
    let remote = remote_graph()?;
    let mut local = DynamicSceneGraph::default();

    let summary = local.merge_graph(&remote, &MergeOptions::default());
    assert_eq!(summary.mesh_edges_added, 0);
    assert_eq!(local.num_mesh_edges(), 0);
    Ok(())
}

#[test]
fn test_merge_twice_changes_nothing() -> Result<()> {
    let remote = remote_graph()?;
    let mut local = DynamicSceneGraph::default();
    let options = MergeOptions {
        allow_invalid_mesh: true,
        clear_mesh_edges: false,
        ..MergeOptions::default()
    };

    local.merge_graph(&remote, &options);
    let before = counts(&local);
    let summary = local.merge_graph(&remote, &options);

    assert_eq!(summary, MergeSummary::default());
    assert_eq!(counts(&local), before);
    Ok(())
}

#[test]
fn test_merge_graph_into_own_snapshot() -> Result<()> {
    let mut graph = remote_graph()?;
    let before = counts(&graph);
    let snapshot = graph.clone();

    let summary = graph.merge_graph(&snapshot, &MergeOptions::default());

    assert_eq!(summary.nodes_added, 0);
    assert_eq!(summary.dynamic_nodes_added, 0);
    assert_eq!(summary.interlayer_edges_added, 0);
    assert_eq!(counts(&graph), before);
    Ok(())
}

#[test]
fn test_merge_propagates_removals() -> Result<()> {
    let mut remote = remote_graph()?;
    let mut local = DynamicSceneGraph::default();
    local.merge_graph(&remote, &MergeOptions::default());

    remote.remove_node(2)?;
    let summary = local.merge_graph(&remote, &MergeOptions::default());

    assert_eq!(summary.nodes_removed, 1);
    assert!(!local.has_node(2));
    assert!(!local.has_edge(1, 2));
    assert!(!local
        .get_node(LayerPrefix::new('a').make_id(0))
        .unwrap()
        .has_parent());
    Ok(())
}

#[test]
fn test_merge_respects_update_map() -> Result<()> {
    let mut remote = remote_graph()?;
    let mut local = DynamicSceneGraph::default();
    local.merge_graph(&remote, &MergeOptions::default());

    remote.update_from_layer(
        &mut {
            let mut layer = scenegraph_core::SceneGraphLayer::new(DsgLayers::PLACES);
            layer.emplace_node(1, at(50.0))?;
            layer
        },
        None,
    )?;
    remote.update_from_layer(
        &mut {
            let mut layer = scenegraph_core::SceneGraphLayer::new(DsgLayers::ROOMS);
            layer.emplace_node(100, at(60.0))?;
            layer
        },
        None,
    )?;

    let options = MergeOptions {
        update_map: HashMap::from([(DsgLayers::PLACES, false)]),
        ..MergeOptions::default()
    };
    local.merge_graph(&remote, &options);

    assert_eq!(local.position(1), Point3::new(1.0, 0.0, 0.0));
    assert_eq!(local.position(100), Point3::new(60.0, 0.0, 0.0));
    Ok(())
}

#[test]
fn test_dynamic_merge_only_appends() -> Result<()> {
    let robot = LayerPrefix::new('a');
    let mut local = DynamicSceneGraph::default();
    local.emplace_dynamic_node(DsgLayers::AGENTS, robot, Duration::from_secs(0), at(-1.0), true)?;

    let remote = remote_graph()?;
    let options = MergeOptions {
        update_dynamic: false,
        ..MergeOptions::default()
    };
    let summary = local.merge_graph(&remote, &options);

    assert_eq!(summary.dynamic_nodes_added, 2);
    assert_eq!(local.position(robot.make_id(0)), Point3::new(-1.0, 0.0, 0.0));
    assert_eq!(local.dynamic_layer(DsgLayers::AGENTS, robot).next_node_id(), robot.make_id(3));
    Ok(())
}

#[test]
fn test_change_feed_after_merge() -> Result<()> {
    let remote = remote_graph()?;
    let mut local = DynamicSceneGraph::default();
    local.merge_graph(&remote, &MergeOptions::default());

    let mut new_nodes = local.get_new_nodes(true);
    new_nodes.sort_unstable();
    assert_eq!(new_nodes.len(), 6);
    assert!(local.get_new_nodes(true).is_empty());

    let new_edges = local.get_new_edges(true);
    assert!(new_edges.contains(&EdgeKey::new(1, 100)));
    assert!(new_edges.contains(&EdgeKey::new(2, 1)));
    assert_eq!(new_edges.len(), local.num_edges());
    assert!(local.get_new_edges(true).is_empty());

    local.remove_edge(1, 2)?;
    assert_eq!(local.get_removed_edges(false), vec![EdgeKey::new(1, 2)]);
    assert_eq!(local.get_removed_edges(true), vec![EdgeKey::new(1, 2)]);
    assert!(local.get_removed_edges(true).is_empty());
    Ok(())
}
