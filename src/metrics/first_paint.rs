//! Graphs truncated at a paint
//!
//! First contentful paint and first meaningful paint share one graph shape:
//! everything that could have held the paint back, and nothing that finished
//! after it.
//!
//! - **Network:** requests that ended before the paint (the main document is
//!   always kept) and pass the metric's render-blocking predicate, minus
//!   scripts known to have been evaluated after the paint
//! - **CPU:** tasks that started before the paint and either evaluated a
//!   possibly render-blocking script or were the first parse, layout or paint
//!   task (plus any task the metric adds explicitly)

use crate::dependency_graph::DependencyGraph;
use crate::lantern_metric::get_script_urls;
use crate::node::{CpuNode, NetworkNode, Node, NodeId};
use std::collections::{HashMap, HashSet};

/// How to cut a graph at a paint
pub(crate) struct PaintCutoff<'a> {
    /// Paint timestamp (ms)
    pub cutoff: f64,
    pub treat_as_render_blocking: &'a dyn Fn(&NetworkNode) -> bool,
    pub additional_blocking_cpu: Option<&'a dyn Fn(&CpuNode) -> bool>,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct RenderBlockingData {
    /// Scripts that ended before the paint but were evaluated after it
    pub definitely_not_blocking_script_urls: HashSet<String>,
    pub blocking_cpu_nodes: HashSet<NodeId>,
}

pub(crate) fn render_blocking_data(
    graph: &DependencyGraph,
    options: &PaintCutoff<'_>,
) -> RenderBlockingData {
    let cutoff = options.cutoff;

    // Earliest task evaluating each script URL
    let mut evaluators: HashMap<&str, &CpuNode> = HashMap::new();
    let mut cpu_before_paint: Vec<&CpuNode> = Vec::new();

    for task in graph.nodes().filter_map(Node::as_cpu) {
        if task.start_time <= cutoff {
            cpu_before_paint.push(task);
        }
        for url in task.evaluated_script_urls() {
            let earliest = evaluators.entry(url).or_insert(task);
            if task.start_time < earliest.start_time {
                *earliest = task;
            }
        }
    }
    cpu_before_paint.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });
    let before_paint: HashSet<NodeId> = cpu_before_paint.iter().map(|task| task.id).collect();

    let possibly_blocking = get_script_urls(
        graph,
        Some(&|request: &NetworkNode| {
            request.end_time <= cutoff && (options.treat_as_render_blocking)(request)
        }),
    );

    let mut data = RenderBlockingData::default();
    for url in possibly_blocking {
        let Some(evaluator) = evaluators.get(url.as_str()) else {
            continue;
        };
        if before_paint.contains(&evaluator.id) {
            data.blocking_cpu_nodes.insert(evaluator.id);
        } else {
            data.definitely_not_blocking_script_urls.insert(url);
        }
    }

    let firsts = [
        cpu_before_paint.iter().find(|task| task.did_perform_layout()),
        cpu_before_paint.iter().find(|task| task.did_paint()),
        cpu_before_paint.iter().find(|task| task.did_parse_html()),
    ];
    data.blocking_cpu_nodes
        .extend(firsts.into_iter().flatten().map(|task| task.id));

    if let Some(extra) = options.additional_blocking_cpu {
        data.blocking_cpu_nodes.extend(
            cpu_before_paint
                .iter()
                .filter(|task| extra(task))
                .map(|task| task.id),
        );
    }

    data
}

/// Clone `graph` keeping only what could have blocked the paint
pub(crate) fn first_paint_based_graph(
    graph: &DependencyGraph,
    options: &PaintCutoff<'_>,
) -> DependencyGraph {
    let data = render_blocking_data(graph, options);
    let cutoff = options.cutoff;

    graph.clone_with_relationships(|node| match node {
        Node::Network(request) => {
            let ended_after_paint = request.end_time > cutoff || request.start_time > cutoff;
            if ended_after_paint && !request.is_main_document {
                return false;
            }
            if data
                .definitely_not_blocking_script_urls
                .contains(&request.url)
            {
                return false;
            }
            (options.treat_as_render_blocking)(request)
        }
        Node::Cpu(task) => data.blocking_cpu_nodes.contains(&task.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{page_graph, FCP_TS};

    fn blocking(request: &NetworkNode) -> bool {
        request.has_render_blocking_priority()
    }

    #[test]
    fn test_blocking_cpu_nodes() {
        let graph = page_graph();
        let data = render_blocking_data(
            &graph,
            &PaintCutoff {
                cutoff: FCP_TS,
                treat_as_render_blocking: &blocking,
                additional_blocking_cpu: None,
            },
        );

        // parse (2), app.js evaluation (5), first layout + paint (6)
        let expected: HashSet<NodeId> = [2, 5, 6].into_iter().map(NodeId).collect();
        assert_eq!(data.blocking_cpu_nodes, expected);
        assert!(data.definitely_not_blocking_script_urls.is_empty());
    }

    #[test]
    fn test_script_evaluated_after_paint_is_not_blocking() {
        let graph = page_graph();
        // app.js finished downloading at 240 but is evaluated at 250
        let data = render_blocking_data(
            &graph,
            &PaintCutoff {
                cutoff: 245.0,
                treat_as_render_blocking: &blocking,
                additional_blocking_cpu: None,
            },
        );

        assert!(data
            .definitely_not_blocking_script_urls
            .contains("https://example.com/app.js"));
        assert!(!data.blocking_cpu_nodes.contains(&NodeId(5)));
    }

    #[test]
    fn test_additional_cpu_filter() {
        let graph = page_graph();
        let layout = |task: &CpuNode| task.did_perform_layout();
        let data = render_blocking_data(
            &graph,
            &PaintCutoff {
                cutoff: 400.0,
                treat_as_render_blocking: &blocking,
                additional_blocking_cpu: Some(&layout),
            },
        );

        // Second layout task (12) only joins through the extra filter
        assert!(data.blocking_cpu_nodes.contains(&NodeId(12)));
    }

    #[test]
    fn test_first_paint_graph_drops_late_and_non_blocking_work() {
        let graph = page_graph();
        let variant = first_paint_based_graph(
            &graph,
            &PaintCutoff {
                cutoff: FCP_TS,
                treat_as_render_blocking: &blocking,
                additional_blocking_cpu: None,
            },
        );

        let mut ids: Vec<u32> = variant.nodes().map(|node| node.id().0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 11]);

        // Input graph untouched
        assert_eq!(graph.node_count(), 12);
    }
}
