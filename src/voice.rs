//! Voice builder — turns frequencies and a timbre recipe into live graph nodes.
//!
//! Per frequency: one oscillator per harmonic (plus a detuned twin of the
//! fundamental when the recipe has chorus), each through its own gain into a
//! shared low-pass filter. Every filter of the voice feeds one envelope gain,
//! so a chord attacks and releases as a unit.

use tracing::{debug, trace};

use crate::dsp::oscillator::Waveform;
use crate::error::Result;
use crate::graph::{AudioGraph, NodeId};
use crate::timbre::{TimbreId, TimbreRecipe};

/// Level of the detuned twin relative to the fundamental.
const CHORUS_LEVEL: f64 = 0.8;

/// The graph resources of one sounding note.
#[derive(Debug)]
pub struct VoiceUnit {
    timbre: TimbreId,
    frequencies: Vec<f64>,
    oscillators: Vec<NodeId>,
    /// Per-harmonic gains and filters.
    stages: Vec<NodeId>,
    envelope: NodeId,
    started_at: f64,
}

impl VoiceUnit {
    pub fn timbre(&self) -> TimbreId {
        self.timbre
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn oscillators(&self) -> &[NodeId] {
        &self.oscillators
    }

    pub fn generator_count(&self) -> usize {
        self.oscillators.len()
    }

    /// The shared envelope gain.
    pub fn envelope(&self) -> NodeId {
        self.envelope
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Fade out over `release_time` and schedule every oscillator to stop
    /// when the fade ends. The graph frees the nodes once they fall silent.
    pub fn release<G: AudioGraph>(&self, graph: &mut G, release_time: f64) {
        let now = graph.current_time();
        let end = now + release_time;

        let faded = graph
            .cancel_and_hold_gain(self.envelope, now)
            .and_then(|()| graph.linear_ramp_gain(self.envelope, 0.0, end));
        if let Err(e) = faded {
            trace!(error = %e, "envelope fade not scheduled");
        }

        for &osc in &self.oscillators {
            if let Err(e) = graph.stop(osc, end) {
                trace!(error = %e, "oscillator already stopped");
            }
        }
    }

    /// Stop now and remove every node. No fade.
    pub fn teardown<G: AudioGraph>(self, graph: &mut G) {
        let now = graph.current_time();
        for &osc in &self.oscillators {
            if let Err(e) = graph.stop(osc, now) {
                trace!(error = %e, "oscillator already stopped");
            }
        }
        let nodes = self
            .oscillators
            .iter()
            .chain(&self.stages)
            .chain(std::iter::once(&self.envelope));
        for &node in nodes {
            if let Err(e) = graph.dispose(node) {
                trace!(error = %e, "node already gone");
            }
        }
    }
}

/// Builds [`VoiceUnit`]s into a graph.
#[derive(Debug, Clone)]
pub struct VoiceBuilder {
    peak_gain: f64,
}

impl VoiceBuilder {
    pub fn new(peak_gain: f64) -> Self {
        VoiceBuilder { peak_gain }
    }

    /// Oscillators a recipe needs per frequency.
    pub fn generators_per_frequency(recipe: &TimbreRecipe) -> usize {
        recipe.harmonics.len() + usize::from(recipe.detune > 0.0)
    }

    /// Build and start a voice routed into `destination`.
    ///
    /// On failure every node created so far is removed before the error is returned.
    pub fn build<G: AudioGraph>(
        &self,
        graph: &mut G,
        frequencies: &[f64],
        timbre: TimbreId,
        destination: NodeId,
    ) -> Result<VoiceUnit> {
        let recipe = timbre.recipe();
        let envelope = graph.create_gain(0.0)?;
        let mut unit = VoiceUnit {
            timbre,
            frequencies: frequencies.to_vec(),
            oscillators: Vec::with_capacity(frequencies.len() * Self::generators_per_frequency(&recipe)),
            stages: Vec::new(),
            envelope,
            started_at: graph.current_time(),
        };

        if let Err(e) = self.wire(graph, &mut unit, &recipe, destination) {
            unit.teardown(graph);
            return Err(e);
        }

        debug!(
            ?frequencies,
            %timbre,
            oscillators = unit.oscillators.len(),
            "voice started"
        );
        Ok(unit)
    }

    fn wire<G: AudioGraph>(
        &self,
        graph: &mut G,
        unit: &mut VoiceUnit,
        recipe: &TimbreRecipe,
        destination: NodeId,
    ) -> Result<()> {
        for i in 0..unit.frequencies.len() {
            let frequency = unit.frequencies[i];
            let filter = graph.create_lowpass(recipe.filter_freq, recipe.filter_q)?;
            unit.stages.push(filter);
            graph.connect(filter, unit.envelope)?;

            for (h, &amplitude) in recipe.harmonics.iter().enumerate() {
                let harmonic = frequency * (h + 1) as f64;
                if h == 0 && recipe.detune > 0.0 {
                    add_oscillator(graph, unit, recipe.waveform, harmonic, recipe.detune, amplitude, filter)?;
                    add_oscillator(
                        graph,
                        unit,
                        recipe.waveform,
                        frequency,
                        -recipe.detune,
                        amplitude * CHORUS_LEVEL,
                        filter,
                    )?;
                } else {
                    add_oscillator(graph, unit, recipe.waveform, harmonic, 0.0, amplitude, filter)?;
                }
            }
        }

        graph.connect(unit.envelope, destination)?;

        let now = graph.current_time();
        let attack_end = now + recipe.attack;
        graph.set_gain_at(unit.envelope, 0.0, now)?;
        graph.linear_ramp_gain(unit.envelope, self.peak_gain, attack_end)?;
        graph.linear_ramp_gain(unit.envelope, recipe.sustain, attack_end + recipe.decay)?;

        for &osc in &unit.oscillators {
            graph.start(osc, now)?;
        }
        unit.started_at = now;
        Ok(())
    }
}

fn add_oscillator<G: AudioGraph>(
    graph: &mut G,
    unit: &mut VoiceUnit,
    waveform: Waveform,
    frequency: f64,
    detune: f64,
    amplitude: f64,
    filter: NodeId,
) -> Result<()> {
    let osc = graph.create_oscillator(waveform, frequency, detune)?;
    unit.oscillators.push(osc);
    let gain = graph.create_gain(amplitude)?;
    unit.stages.push(gain);
    graph.connect(osc, gain)?;
    graph.connect(gain, filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MasterBus, Volume};
    use crate::dsp::context::RenderGraph;
    use crate::error::Error;

    fn setup() -> (RenderGraph, MasterBus) {
        let mut graph = RenderGraph::new(44100.0);
        graph.resume().unwrap();
        let bus = MasterBus::attach(&mut graph, Volume::new(100)).unwrap();
        (graph, bus)
    }

    #[test]
    fn harmonics_and_chorus_twin() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[200.0], TimbreId::Accordion, bus.input())
            .unwrap();

        assert_eq!(voice.generator_count(), 4);
        let oscs: Vec<_> = voice
            .oscillators()
            .iter()
            .map(|&id| graph.oscillator(id).unwrap().clone())
            .collect();
        let freqs: Vec<(f64, f64)> = oscs.iter().map(|o| (o.frequency, o.detune)).collect();
        assert_eq!(freqs, vec![(200.0, 3.0), (200.0, -3.0), (400.0, 0.0), (600.0, 0.0)]);
        assert!(oscs.iter().all(|o| o.waveform == Waveform::Sawtooth));
        assert!(graph.is_connected(voice.envelope(), bus.input()));
    }

    #[test]
    fn no_twin_without_detune() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[110.0], TimbreId::Organ, bus.input())
            .unwrap();
        assert_eq!(voice.generator_count(), 5);
        assert!(voice
            .oscillators()
            .iter()
            .all(|&id| graph.oscillator(id).unwrap().detune == 0.0));
    }

    #[test]
    fn chord_shares_one_envelope() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[196.0, 246.94, 293.66], TimbreId::Harmonica, bus.input())
            .unwrap();
        // harmonica: 2 harmonics + chorus twin, three notes
        assert_eq!(voice.generator_count(), 9);
        // dest + master + envelope + 3 * (filter + 3 osc + 3 gain)
        assert_eq!(graph.node_count(), 3 + 3 * 7);
    }

    #[test]
    fn envelope_shape() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[440.0], TimbreId::Accordion, bus.input())
            .unwrap();
        let env = voice.envelope();
        let at = |t: f64| graph.gain_at(env, t).unwrap();
        assert_eq!(at(0.0), 0.0);
        assert!((at(0.03) - 0.4).abs() < 1e-9, "peak after attack");
        assert!((at(0.13) - 0.25).abs() < 1e-9, "sustain after decay");
        assert!((at(3.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn release_fades_and_schedules_stop() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[440.0], TimbreId::Accordion, bus.input())
            .unwrap();
        // into the sustain stage
        let mut buf = vec![0.0f32; 8820];
        graph.render(&mut buf);

        voice.release(&mut graph, 0.15);
        let env = voice.envelope();
        assert!((graph.gain_at(env, 0.2).unwrap() - 0.25).abs() < 1e-9);
        assert!((graph.gain_at(env, 0.275).unwrap() - 0.125).abs() < 1e-9);
        assert!(graph.gain_at(env, 0.35).unwrap().abs() < 1e-9);
        for &osc in voice.oscillators() {
            let stop = graph.stop_time(osc).unwrap();
            assert!((stop - 0.35).abs() < 1e-9);
        }

        // second release swallows the double stop
        voice.release(&mut graph, 0.15);

        let mut tail = vec![0.0f32; 8820];
        graph.render(&mut tail);
        assert_eq!(graph.node_count(), 2, "voice nodes freed after the tail");
    }

    #[test]
    fn failed_build_leaves_nothing_behind() {
        let mut graph = RenderGraph::new(44100.0).with_max_nodes(Some(10));
        let bus = MasterBus::attach(&mut graph, Volume::new(100)).unwrap();
        let before = graph.node_count();

        let err = VoiceBuilder::new(0.4)
            .build(&mut graph, &[196.0, 246.94, 293.66], TimbreId::Musette, bus.input())
            .unwrap_err();
        assert!(matches!(err, Error::NodeLimit { limit: 10 }));
        assert_eq!(graph.node_count(), before);
    }

    #[test]
    fn teardown_is_immediate() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[440.0], TimbreId::Bandoneon, bus.input())
            .unwrap();
        let oscs = voice.oscillators().to_vec();
        voice.teardown(&mut graph);
        assert_eq!(graph.node_count(), 2);
        assert!(oscs.iter().all(|&id| !graph.contains(id)));
    }

    #[test]
    fn teardown_after_release_still_frees_everything() {
        let (mut graph, bus) = setup();
        let voice = VoiceBuilder::new(0.4)
            .build(&mut graph, &[196.0, 246.94], TimbreId::Accordion, bus.input())
            .unwrap();
        let oscs = voice.oscillators().to_vec();
        voice.release(&mut graph, 0.15);
        let scheduled: Vec<_> = oscs.iter().map(|&id| graph.stop_time(id)).collect();
        assert!(scheduled.iter().all(Option::is_some));

        voice.teardown(&mut graph);
        assert_eq!(graph.node_count(), 2);
        assert!(oscs.iter().all(|&id| !graph.contains(id)));
    }
}
