//! Destinations for finished causal graphs.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::causal::CausalGraph;

/// Receives normalized causal graphs for display or storage.
pub trait VisualizationSink {
    /// # Errors
    ///
    /// Sink specific, usually I/O.
    fn accept(&mut self, iteration: usize, graph: &CausalGraph) -> Result<()>;
}

#[derive(Serialize)]
struct Record<'a> {
    iteration: usize,
    graph: &'a CausalGraph,
}

/// Writes one JSON object per graph, one per line.
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> VisualizationSink for JsonSink<W> {
    fn accept(&mut self, iteration: usize, graph: &CausalGraph) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &Record { iteration, graph })?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs the matrix row by row and the edges above `threshold`.
pub struct LogSink {
    pub threshold: f32,
}

impl Default for LogSink {
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

impl LogSink {
    #[must_use]
    pub fn render(graph: &CausalGraph) -> Vec<String> {
        (0..graph.dim)
            .map(|i| {
                let weights: Vec<String> = graph.row(i).iter().map(|w| format!("{w:.2}")).collect();
                format!("z{i:02} -> {}", weights.join(" "))
            })
            .collect()
    }
}

impl VisualizationSink for LogSink {
    fn accept(&mut self, iteration: usize, graph: &CausalGraph) -> Result<()> {
        tracing::info!("Causal graph at iteration {}:", iteration);
        for line in Self::render(graph) {
            tracing::info!("  {}", line);
        }
        for edge in graph.strongest_edges(self.threshold) {
            tracing::info!("  z{} -> z{}: {:.3}", edge.source, edge.target, edge.weight);
        }
        Ok(())
    }
}
