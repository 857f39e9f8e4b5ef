//! Render graph — a pure-Rust [`AudioGraph`] that produces samples.
//!
//! In the browser an AudioWorklet pulls blocks from [`RenderGraph::render`];
//! natively it runs under a test clock. The clock only advances while the
//! context is running, so rendering is fully deterministic.

use tracing::debug;

use super::filter::Lowpass;
use super::oscillator::{Oscillator, Waveform};
use super::param::Param;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::{AudioGraph, ContextState, GraphFactory, NodeId};

enum Kind {
    Destination,
    Oscillator {
        osc: Oscillator,
        start: Option<f64>,
        stop: Option<f64>,
    },
    Gain(Param),
    Lowpass(Lowpass),
}

struct Node {
    kind: Kind,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Node graph rendered sample by sample in topological order.
pub struct RenderGraph {
    sample_rate: f64,
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    /// Budget on live nodes, destination included.
    max_nodes: Option<usize>,
    destination: NodeId,
    state: ContextState,
    autoplay_allowed: bool,
    frames: u64,
    order: Vec<usize>,
    order_dirty: bool,
    values: Vec<f64>,
}

impl RenderGraph {
    pub fn new(sample_rate: f64) -> Self {
        let mut graph = RenderGraph {
            sample_rate,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_nodes: None,
            destination: NodeId { index: 0, generation: 0 },
            state: ContextState::Suspended,
            autoplay_allowed: true,
            frames: 0,
            order: Vec::new(),
            order_dirty: true,
            values: Vec::new(),
        };
        graph.destination = graph.insert(Kind::Destination);
        graph
    }

    pub fn with_max_nodes(mut self, limit: Option<usize>) -> Self {
        self.max_nodes = limit;
        self
    }

    /// While disallowed, `resume` fails as a browser does before a user gesture.
    pub fn set_autoplay_allowed(&mut self, allowed: bool) {
        self.autoplay_allowed = allowed;
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Live nodes, destination included.
    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn oscillator(&self, id: NodeId) -> Option<&Oscillator> {
        match &self.node(id).ok()?.kind {
            Kind::Oscillator { osc, .. } => Some(osc),
            _ => None,
        }
    }

    /// Scheduled stop time of an oscillator, if any.
    pub fn stop_time(&self, id: NodeId) -> Option<f64> {
        match &self.node(id).ok()?.kind {
            Kind::Oscillator { stop, .. } => *stop,
            _ => None,
        }
    }

    pub fn lowpass(&self, id: NodeId) -> Option<&Lowpass> {
        match &self.node(id).ok()?.kind {
            Kind::Lowpass(filter) => Some(filter),
            _ => None,
        }
    }

    /// Gain value at time `at`.
    pub fn gain_at(&self, id: NodeId, at: f64) -> Option<f64> {
        match &self.node(id).ok()?.kind {
            Kind::Gain(param) => Some(param.value_at(at)),
            _ => None,
        }
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        match (self.node(from), self.node(to)) {
            (Ok(node), Ok(_)) => node.outputs.contains(&(to.index as usize)),
            _ => false,
        }
    }

    /// Render one block. Silence while suspended or closed.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state != ContextState::Running {
            out.fill(0.0);
            return;
        }
        if self.order_dirty {
            self.sort();
        }

        let dest = self.destination.index as usize;
        let sample_rate = self.sample_rate;
        let frames = self.frames;
        let RenderGraph { slots, values, order, .. } = self;

        for (i, sample) in out.iter_mut().enumerate() {
            let t = (frames + i as u64) as f64 / sample_rate;
            for &idx in order.iter() {
                let Some(node) = slots[idx].node.as_mut() else {
                    continue;
                };
                let input: f64 = node.inputs.iter().map(|&j| values[j]).sum();
                values[idx] = match &mut node.kind {
                    Kind::Destination => input,
                    Kind::Oscillator { osc, start, stop } => {
                        let started = start.is_some_and(|s| s <= t);
                        if started && stop.is_none_or(|s| t < s) {
                            osc.next_sample()
                        } else {
                            0.0
                        }
                    }
                    Kind::Gain(param) => input * param.value_at(t),
                    Kind::Lowpass(filter) => filter.process(input),
                };
            }
            *sample = soft_clip(values[dest]) as f32;
        }

        self.frames += out.len() as u64;
        self.collect();
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(Error::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::UnknownNode(id))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ContextState::Closed {
            return Err(Error::ContextClosed);
        }
        Ok(())
    }

    fn allocate(&mut self, kind: Kind) -> Result<NodeId> {
        self.ensure_open()?;
        if let Some(limit) = self.max_nodes {
            if self.live >= limit {
                return Err(Error::NodeLimit { limit });
            }
        }
        Ok(self.insert(kind))
    }

    fn insert(&mut self, kind: Kind) -> NodeId {
        let node = Node {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                self.values.push(0.0);
                self.slots.len() - 1
            }
        };
        self.live += 1;
        self.order_dirty = true;
        NodeId {
            index: index as u32,
            generation: self.slots[index].generation,
        }
    }

    /// Remove a node and every edge touching it. The slot's generation moves on.
    fn release(&mut self, index: usize) {
        let Some(node) = self.slots[index].node.take() else {
            return;
        };
        for &out in &node.outputs {
            if let Some(target) = self.slots[out].node.as_mut() {
                target.inputs.retain(|&i| i != index);
            }
        }
        for &input in &node.inputs {
            if let Some(source) = self.slots[input].node.as_mut() {
                source.outputs.retain(|&i| i != index);
            }
        }
        self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
        self.values[index] = 0.0;
        self.free.push(index);
        self.live -= 1;
        self.order_dirty = true;
    }

    fn reaches(&self, from: usize, target: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.slots.len()];
        while let Some(idx) = stack.pop() {
            if idx == target {
                return true;
            }
            if std::mem::replace(&mut seen[idx], true) {
                continue;
            }
            if let Some(node) = &self.slots[idx].node {
                stack.extend(node.outputs.iter().copied());
            }
        }
        false
    }

    /// Kahn's algorithm over live nodes.
    fn sort(&mut self) {
        let mut indegree: Vec<usize> = self
            .slots
            .iter()
            .map(|slot| slot.node.as_ref().map_or(0, |n| n.inputs.len()))
            .collect();
        let mut ready: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(i, slot)| slot.node.is_some() && indegree[*i] == 0)
            .map(|(i, _)| i)
            .collect();

        self.order.clear();
        while let Some(idx) = ready.pop() {
            self.order.push(idx);
            if let Some(node) = &self.slots[idx].node {
                for &out in &node.outputs {
                    indegree[out] -= 1;
                    if indegree[out] == 0 {
                        ready.push(out);
                    }
                }
            }
        }
        self.order_dirty = false;
    }

    /// Free oscillators whose stop time has passed, then every node left
    /// without inputs because of it. Nodes wired straight into the
    /// destination (the master bus) stay.
    fn collect(&mut self) {
        let now = self.current_time();
        let dest = self.destination.index as usize;

        let mut pending: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match &slot.node {
                Some(Node {
                    kind: Kind::Oscillator { stop: Some(stop), .. },
                    ..
                }) if *stop <= now => Some(i),
                _ => None,
            })
            .collect();

        while let Some(idx) = pending.pop() {
            let outputs = match &self.slots[idx].node {
                Some(node) => node.outputs.clone(),
                None => continue,
            };
            self.release(idx);
            for out in outputs {
                if out == dest {
                    continue;
                }
                if let Some(node) = &self.slots[out].node {
                    let pinned = node.outputs.contains(&dest);
                    let source = matches!(node.kind, Kind::Oscillator { .. });
                    if node.inputs.is_empty() && !pinned && !source {
                        pending.push(out);
                    }
                }
            }
        }

        for slot in &mut self.slots {
            if let Some(Node { kind: Kind::Gain(param), .. }) = &mut slot.node {
                param.prune(now);
            }
        }
    }

    fn gain_param(&mut self, id: NodeId) -> Result<&mut Param> {
        self.ensure_open()?;
        match &mut self.node_mut(id)?.kind {
            Kind::Gain(param) => Ok(param),
            _ => Err(Error::NotAGain(id)),
        }
    }

    fn oscillator_times(&mut self, id: NodeId) -> Result<(&mut Option<f64>, &mut Option<f64>)> {
        self.ensure_open()?;
        match &mut self.node_mut(id)?.kind {
            Kind::Oscillator { start, stop, .. } => Ok((start, stop)),
            _ => Err(Error::NotAnOscillator(id)),
        }
    }
}

impl AudioGraph for RenderGraph {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.autoplay_allowed {
            return Err(Error::ResumeDenied);
        }
        if self.state != ContextState::Running {
            debug!(sample_rate = self.sample_rate, "render graph running");
            self.state = ContextState::Running;
        }
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = ContextState::Suspended;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state == ContextState::Closed {
            return Ok(());
        }
        let dest = self.destination.index as usize;
        for idx in 0..self.slots.len() {
            if idx != dest {
                self.release(idx);
            }
        }
        self.state = ContextState::Closed;
        debug!(frames = self.frames, "render graph closed");
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f64, detune: f64) -> Result<NodeId> {
        let osc = Oscillator::new(waveform, frequency, detune, self.sample_rate);
        self.allocate(Kind::Oscillator { osc, start: None, stop: None })
    }

    fn create_gain(&mut self, gain: f64) -> Result<NodeId> {
        self.allocate(Kind::Gain(Param::new(gain)))
    }

    fn create_lowpass(&mut self, cutoff: f64, q: f64) -> Result<NodeId> {
        let filter = Lowpass::new(cutoff, q, self.sample_rate);
        self.allocate(Kind::Lowpass(filter))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.ensure_open()?;
        self.node(to)?;
        if self.node(from)?.outputs.contains(&(to.index as usize)) {
            return Ok(());
        }
        let (f, t) = (from.index as usize, to.index as usize);
        if self.reaches(t, f) {
            return Err(Error::Cycle { from, to });
        }
        self.node_mut(from)?.outputs.push(t);
        self.node_mut(to)?.inputs.push(f);
        self.order_dirty = true;
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<()> {
        self.ensure_open()?;
        let outputs = std::mem::take(&mut self.node_mut(node)?.outputs);
        let index = node.index as usize;
        for out in outputs {
            if let Some(target) = self.slots[out].node.as_mut() {
                target.inputs.retain(|&i| i != index);
            }
        }
        self.order_dirty = true;
        Ok(())
    }

    fn dispose(&mut self, node: NodeId) -> Result<()> {
        self.ensure_open()?;
        if node == self.destination {
            return Ok(());
        }
        self.node(node)?;
        self.release(node.index as usize);
        Ok(())
    }

    fn start(&mut self, oscillator: NodeId, at: f64) -> Result<()> {
        let (start, _) = self.oscillator_times(oscillator)?;
        if start.is_some() {
            return Err(Error::AlreadyStarted(oscillator));
        }
        *start = Some(at);
        Ok(())
    }

    fn stop(&mut self, oscillator: NodeId, at: f64) -> Result<()> {
        let (_, stop) = self.oscillator_times(oscillator)?;
        if stop.is_some() {
            return Err(Error::AlreadyStopped(oscillator));
        }
        *stop = Some(at);
        Ok(())
    }

    fn set_gain(&mut self, node: NodeId, value: f64) -> Result<()> {
        self.gain_param(node)?.set(value);
        Ok(())
    }

    fn set_gain_at(&mut self, node: NodeId, value: f64, at: f64) -> Result<()> {
        self.gain_param(node)?.set_value_at(value, at);
        Ok(())
    }

    fn linear_ramp_gain(&mut self, node: NodeId, value: f64, at: f64) -> Result<()> {
        self.gain_param(node)?.linear_ramp_to(value, at);
        Ok(())
    }

    fn cancel_and_hold_gain(&mut self, node: NodeId, at: f64) -> Result<()> {
        self.gain_param(node)?.cancel_and_hold(at);
        Ok(())
    }
}

/// Builds [`RenderGraph`]s with the sample rate and node budget of a config.
#[derive(Debug, Clone)]
pub struct RenderGraphFactory {
    sample_rate: f64,
    max_nodes: Option<usize>,
}

impl RenderGraphFactory {
    pub fn new(config: &EngineConfig) -> Self {
        RenderGraphFactory {
            sample_rate: config.sample_rate,
            max_nodes: config.max_nodes,
        }
    }
}

impl GraphFactory for RenderGraphFactory {
    type Graph = RenderGraph;

    fn create_graph(&mut self) -> Result<RenderGraph> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::GraphUnavailable(format!(
                "invalid sample rate {}",
                self.sample_rate
            )));
        }
        Ok(RenderGraph::new(self.sample_rate).with_max_nodes(self.max_nodes))
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn running() -> RenderGraph {
        let mut g = RenderGraph::new(SR);
        g.resume().unwrap();
        g
    }

    /// osc -> gain -> master -> destination
    fn tone(g: &mut RenderGraph) -> (NodeId, NodeId, NodeId) {
        let master = g.create_gain(1.0).unwrap();
        let dest = g.destination();
        g.connect(master, dest).unwrap();
        let osc = g.create_oscillator(Waveform::Sine, 440.0, 0.0).unwrap();
        let gain = g.create_gain(0.5).unwrap();
        g.connect(osc, gain).unwrap();
        g.connect(gain, master).unwrap();
        g.start(osc, 0.0).unwrap();
        (osc, gain, master)
    }

    fn peak(g: &mut RenderGraph, frames: usize) -> f32 {
        let mut buf = vec![0.0f32; frames];
        g.render(&mut buf);
        buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn renders_routed_oscillator() {
        let mut g = running();
        tone(&mut g);
        let p = peak(&mut g, 4410);
        assert!(p > 0.3 && p < 0.5, "expected ~tanh(0.5), got {p}");
        assert!((g.current_time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn suspended_graph_is_silent_and_frozen() {
        let mut g = RenderGraph::new(SR);
        tone(&mut g);
        assert_eq!(g.state(), ContextState::Suspended);
        assert_eq!(peak(&mut g, 512), 0.0);
        assert_eq!(g.current_time(), 0.0);
    }

    #[test]
    fn resume_denied_without_autoplay() {
        let mut g = RenderGraph::new(SR);
        g.set_autoplay_allowed(false);
        assert!(matches!(g.resume(), Err(Error::ResumeDenied)));
        g.set_autoplay_allowed(true);
        g.resume().unwrap();
        assert_eq!(g.state(), ContextState::Running);
    }

    #[test]
    fn oscillator_waits_for_start_time() {
        let mut g = running();
        let master = g.create_gain(1.0).unwrap();
        let dest = g.destination();
        g.connect(master, dest).unwrap();
        let osc = g.create_oscillator(Waveform::Square, 220.0, 0.0).unwrap();
        g.connect(osc, master).unwrap();
        g.start(osc, 0.05).unwrap();

        assert_eq!(peak(&mut g, 2205), 0.0, "silent before start");
        assert!(peak(&mut g, 2205) > 0.5);
    }

    #[test]
    fn second_stop_is_rejected() {
        let mut g = running();
        let (osc, gain, _) = tone(&mut g);
        g.stop(osc, 0.1).unwrap();
        assert!(matches!(g.stop(osc, 0.2), Err(Error::AlreadyStopped(_))));
        assert_eq!(g.stop_time(osc), Some(0.1));
        assert!(matches!(g.start(osc, 0.0), Err(Error::AlreadyStarted(_))));
        assert!(matches!(g.stop(gain, 0.1), Err(Error::NotAnOscillator(_))));
    }

    #[test]
    fn stopped_sources_are_collected_in_cascade() {
        let mut g = running();
        let (osc, gain, master) = tone(&mut g);
        assert_eq!(g.node_count(), 4);

        g.stop(osc, 0.01).unwrap();
        peak(&mut g, 441);

        assert!(!g.contains(osc));
        assert!(!g.contains(gain), "gain fed only by the stopped oscillator is freed");
        assert!(g.contains(master), "master bus is pinned to the destination");
        assert_eq!(g.node_count(), 2);
        assert_eq!(peak(&mut g, 64), 0.0);
    }

    #[test]
    fn disposed_handles_do_not_alias() {
        let mut g = running();
        let a = g.create_gain(1.0).unwrap();
        g.dispose(a).unwrap();
        let b = g.create_gain(1.0).unwrap();
        assert_eq!(a.index, b.index, "slot is reused");
        assert_ne!(a, b);
        assert!(!g.contains(a));
        assert!(matches!(g.set_gain(a, 0.3), Err(Error::UnknownNode(_))));
    }

    #[test]
    fn node_budget() {
        let mut g = RenderGraph::new(SR).with_max_nodes(Some(3));
        g.create_gain(1.0).unwrap();
        g.create_gain(1.0).unwrap();
        assert!(matches!(g.create_gain(1.0), Err(Error::NodeLimit { limit: 3 })));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut g = running();
        let a = g.create_gain(1.0).unwrap();
        let b = g.create_gain(1.0).unwrap();
        g.connect(a, b).unwrap();
        assert!(matches!(g.connect(b, a), Err(Error::Cycle { .. })));
        assert!(matches!(g.connect(a, a), Err(Error::Cycle { .. })));
    }

    #[test]
    fn disconnect_silences_path() {
        let mut g = running();
        let (_, gain, master) = tone(&mut g);
        g.disconnect(gain).unwrap();
        assert!(!g.is_connected(gain, master));
        assert_eq!(peak(&mut g, 256), 0.0);
    }

    #[test]
    fn factory_follows_config() {
        let config = EngineConfig {
            sample_rate: 48000.0,
            max_nodes: Some(64),
            ..EngineConfig::default()
        };
        let g = RenderGraphFactory::new(&config).create_graph().unwrap();
        assert_eq!(g.sample_rate(), 48000.0);
        assert_eq!(g.state(), ContextState::Suspended);

        let broken = EngineConfig {
            sample_rate: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            RenderGraphFactory::new(&broken).create_graph(),
            Err(Error::GraphUnavailable(_))
        ));
    }

    #[test]
    fn closed_graph_refuses_work() {
        let mut g = running();
        tone(&mut g);
        g.close().unwrap();
        assert_eq!(g.node_count(), 1);
        assert!(matches!(g.create_gain(1.0), Err(Error::ContextClosed)));
        assert!(matches!(g.resume(), Err(Error::ContextClosed)));
        assert_eq!(peak(&mut g, 64), 0.0);
        g.close().unwrap();
    }
}
