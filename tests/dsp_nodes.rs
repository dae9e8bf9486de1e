use rt_audio_graph::{
    BlockBuffer, EngineConfig, GraphInterface, GraphOp, NodeHandle, Transport,
};

fn add(id: &str, node_type: &str, params: &[(&str, f32)]) -> GraphOp {
    GraphOp::AddNode {
        node_id: id.to_string(),
        node_type: node_type.to_string(),
        params: params
            .iter()
            .map(|&(name, value)| (name.to_string(), value))
            .collect(),
    }
}

fn connect(from: &str, to: &str, inlet: u32) -> GraphOp {
    GraphOp::Connect {
        from_node_id: from.to_string(),
        from_outlet: 0,
        to_node_id: to.to_string(),
        to_inlet: inlet,
    }
}

fn set_output(id: &str) -> GraphOp {
    GraphOp::SetOutput {
        node_id: Some(id.to_string()),
    }
}

fn engine(block: usize, channels: usize) -> (GraphInterface, rt_audio_graph::GraphExecutor) {
    GraphInterface::new(EngineConfig {
        sample_rate: 48_000.0,
        max_block_size: block,
        channels,
    })
}

/// Biquad lowpass at DC: a constant input must converge to the same
/// constant, since the RBJ lowpass has unity gain at 0 Hz.
#[test]
fn biquad_lowpass_settles_to_dc() {
    let (mut iface, mut exec) = engine(512, 1);
    iface.apply_ops([
        add("in", "input", &[]),
        add(
            "f",
            "filter",
            &[("filterType", 0.0), ("cutoff", 20.0), ("resonance", 0.707)],
        ),
        connect("in", "f", 0),
        set_output("f"),
    ]);

    let mut io = BlockBuffer::new(1, 512);
    let mut last = 0.0;
    for _ in 0..8 {
        io.channel_mut(0).fill(1.0);
        exec.process_block(&mut io, 512, &[], &[], Transport::default());
        last = io.channel(0)[511];
    }

    assert!(
        (last - 1.0).abs() < 1e-3,
        "steady state {} should be within 1e-3 of 1.0",
        last
    );
}

/// ADSR timing: attack 10 ms, decay 20 ms to sustain 0.5, release 50 ms,
/// driven by the gate parameter at 48 kHz.
#[test]
fn adsr_shape_tracks_its_stage_times() {
    let (mut iface, mut exec) = engine(480, 1);
    iface.apply_ops([
        add(
            "env",
            "envelope",
            &[
                ("attack", 10.0),
                ("decay", 20.0),
                ("sustain", 0.5),
                ("release", 50.0),
                ("gate", 1.0),
            ],
        ),
        set_output("env"),
    ]);

    // Gate high for 100 ms = 4800 samples.
    let mut held = Vec::new();
    let mut io = BlockBuffer::new(1, 480);
    for _ in 0..10 {
        io.clear_frames(480);
        exec.process_block(&mut io, 480, &[], &[], Transport::default());
        held.extend_from_slice(io.channel(0));
    }

    // Attack: reaches 1.0 by 480 samples.
    assert!((held[479] - 1.0).abs() < 1e-4, "attack peak {}", held[479]);
    assert!(held[240] > 0.4 && held[240] < 0.6, "mid-attack {}", held[240]);

    // Decay: down to sustain within the next 960 samples.
    assert!((held[1439] - 0.5).abs() < 1e-3, "post-decay {}", held[1439]);

    // Sustain: held within 1e-3.
    for &v in &held[1500..4800] {
        assert!((v - 0.5).abs() < 1e-3, "sustain wobble {}", v);
    }

    // Gate low for 200 ms: release to below 1e-3 within 2400 samples.
    iface.set_node_param("env", "gate", 0.0);
    let mut released = Vec::new();
    for _ in 0..20 {
        io.clear_frames(480);
        exec.process_block(&mut io, 480, &[], &[], Transport::default());
        released.extend_from_slice(io.channel(0));
    }

    let mid = released[1200];
    assert!((mid - 0.25).abs() < 0.05, "release midpoint {}", mid);
    assert!(released[2399] < 1e-3, "release floor {}", released[2399]);
    for &v in &released[2400..] {
        assert!(v < 1e-3);
    }
}

/// Every catalogue node bypasses to a bit-identical copy of inlet 0.
#[test]
fn bypass_equals_passthrough_for_every_node_type() {
    let node_types = [
        "gain",
        "delay",
        "filter",
        "mix",
        "compressor",
        "reverb",
        "convolver",
        "distortion",
        "pan",
        "oscillator",
        "lfo",
        "envelope",
        "meter",
        "spectrum",
        "merge",
        "split",
        "midi_input",
    ];

    let signal: Vec<f32> = (0..32).map(|i| ((i * 37 % 19) as f32 - 9.0) / 10.0).collect();

    for node_type in node_types {
        let (mut iface, mut exec) = engine(32, 2);
        iface.apply_ops([
            add("in", "input", &[]),
            add("n", node_type, &[("bypass", 1.0)]),
            connect("in", "n", 0),
            set_output("n"),
        ]);

        let mut io = BlockBuffer::new(2, 32);
        io.channel_mut(0).copy_from_slice(&signal);
        io.channel_mut(1).copy_from_slice(&signal);
        exec.process_block(&mut io, 32, &[], &[], Transport::default());

        assert_eq!(
            io.channel(0),
            signal.as_slice(),
            "bypassed {} altered channel 0",
            node_type
        );
        assert_eq!(
            io.channel(1),
            signal.as_slice(),
            "bypassed {} altered channel 1",
            node_type
        );
    }
}

#[test]
fn gain_follows_amplitude_modulation() {
    let (mut iface, mut exec) = engine(16, 1);
    iface.apply_ops([
        add("in", "input", &[]),
        add("env", "envelope", &[("gate", 1.0), ("attack", 0.1), ("sustain", 1.0), ("decay", 0.1)]),
        add("g", "gain", &[("gain", 1.0)]),
        connect("in", "g", 0),
        connect("env", "g", 1),
        set_output("g"),
    ]);

    // Let the envelope reach full sustain first.
    let mut io = BlockBuffer::new(1, 16);
    for _ in 0..4 {
        io.channel_mut(0).fill(0.5);
        exec.process_block(&mut io, 16, &[], &[], Transport::default());
    }

    io.channel_mut(0).fill(0.5);
    exec.process_block(&mut io, 16, &[], &[], Transport::default());
    for &sample in io.channel(0) {
        assert!((sample - 0.5).abs() < 1e-3, "unity envelope should pass audio: {}", sample);
    }
}

#[test]
fn pan_hard_left_kills_the_right_channel() {
    let (mut iface, mut exec) = engine(16, 2);
    iface.apply_ops([
        add("in", "input", &[]),
        add("p", "pan", &[("pan", -1.0), ("law", 1.0)]),
        connect("in", "p", 0),
        set_output("p"),
    ]);

    // Run past the pan smoothing ramp (20 ms = 960 samples at 48 kHz).
    let mut io = BlockBuffer::new(2, 16);
    for _ in 0..70 {
        io.channel_mut(0).fill(0.8);
        io.channel_mut(1).fill(0.8);
        exec.process_block(&mut io, 16, &[], &[], Transport::default());
    }

    for &sample in io.channel(1) {
        assert!(sample.abs() < 1e-3, "right channel should be silent: {}", sample);
    }
    for &sample in io.channel(0) {
        assert!((sample - 0.8).abs() < 1e-3, "left channel keeps the signal: {}", sample);
    }
}

#[test]
fn meter_reports_peak_and_rms() {
    let (mut iface, mut exec) = engine(64, 1);
    iface.apply_ops([
        add("in", "input", &[]),
        add("m", "meter", &[]),
        connect("in", "m", 0),
        set_output("m"),
    ]);

    let mut io = BlockBuffer::new(1, 64);
    io.channel_mut(0).fill(0.5);
    exec.process_block(&mut io, 64, &[], &[], Transport::default());

    let handle = match iface.node_handle("m") {
        Some(NodeHandle::Meter(handle)) => handle,
        _ => panic!("meter handle missing"),
    };
    assert!((handle.peak(0) - 0.5).abs() < 1e-6);
    assert!((handle.rms(0) - 0.5).abs() < 1e-6);
    assert_eq!(handle.peak(1), 0.0);
}

#[test]
fn spectrum_finds_the_driving_frequency() {
    let (mut iface, mut exec) = engine(512, 1);
    iface.apply_ops([
        add("in", "input", &[]),
        add("spec", "spectrum", &[]),
        connect("in", "spec", 0),
        set_output("spec"),
    ]);

    // Bin 32 of a 2048-point FFT at 48 kHz is 750 Hz. Feed exactly that
    // so the analysis window contains a whole number of cycles.
    let mut io = BlockBuffer::new(1, 512);
    let mut n = 0u64;
    for _ in 0..4 {
        for s in 0..512 {
            let t = (n + s as u64) as f32;
            io.channel_mut(0)[s] = (std::f32::consts::TAU * 32.0 * t / 2048.0).sin();
        }
        n += 512;
        exec.process_block(&mut io, 512, &[], &[], Transport::default());
    }

    let handle = match iface.node_handle("spec") {
        Some(NodeHandle::Spectrum(handle)) => handle,
        _ => panic!("spectrum handle missing"),
    };
    let mags = handle.magnitudes();
    assert_eq!(mags.len(), 1024);

    let peak_bin = mags
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .unwrap()
        .0;
    assert_eq!(peak_bin, 32);
    assert!((mags[peak_bin] - 1.0).abs() < 1e-6);
}

#[test]
fn midi_input_produces_gate_and_frequency() {
    use rt_audio_graph::{MidiEvent, MidiMessage};

    let (mut iface, mut exec) = engine(16, 2);
    iface.apply_ops([
        add("midi", "midi_input", &[]),
        set_output("midi"),
    ]);

    let events = [MidiEvent {
        frame: 4,
        message: MidiMessage::NoteOn {
            note: 69,
            velocity: 0.9,
        },
    }];

    let mut io = BlockBuffer::new(2, 16);
    exec.process_block(&mut io, 16, &[], &events, Transport::default());

    assert_eq!(io.channel(0)[3], 0.0, "gate closed before the event");
    assert_eq!(io.channel(0)[4], 1.0, "gate opens at the event offset");
    assert!((io.channel(1)[4] - 440.0).abs() < 1e-3, "A4 frequency");

    // Note-off for a different note leaves the gate up.
    let events = [MidiEvent {
        frame: 0,
        message: MidiMessage::NoteOff { note: 60 },
    }];
    exec.process_block(&mut io, 16, &[], &events, Transport::default());
    assert_eq!(io.channel(0)[15], 1.0);

    // Matching note-off releases it.
    let events = [MidiEvent {
        frame: 0,
        message: MidiMessage::NoteOff { note: 69 },
    }];
    exec.process_block(&mut io, 16, &[], &events, Transport::default());
    assert_eq!(io.channel(0)[15], 0.0);
}

#[test]
fn delay_echoes_after_the_configured_time() {
    let (mut iface, mut exec) = engine(96, 1);
    // 1 ms at 48 kHz = 48 samples, full wet.
    iface.apply_ops([
        add("in", "input", &[]),
        add("d", "delay", &[("time", 1.0), ("feedback", 0.0), ("mix", 1.0)]),
        connect("in", "d", 0),
        set_output("d"),
    ]);

    let mut io = BlockBuffer::new(1, 96);
    io.channel_mut(0)[0] = 1.0;
    exec.process_block(&mut io, 96, &[], &[], Transport::default());

    let out = io.channel(0);
    assert!(out[0].abs() < 1e-6, "fully wet delay has no dry component");
    assert!(
        (out[48] - 1.0).abs() < 1e-3,
        "impulse should reappear at 48 samples, got {}",
        out[48]
    );
}

#[test]
fn distortion_hard_clip_bounds_the_signal() {
    let (mut iface, mut exec) = engine(16, 1);
    iface.apply_ops([
        add("in", "input", &[]),
        add(
            "dist",
            "distortion",
            &[
                ("distortionType", 1.0),
                ("drive", 10.0),
                ("outputGain", 1.0),
                ("mix", 1.0),
            ],
        ),
        connect("in", "dist", 0),
        set_output("dist"),
    ]);

    let mut io = BlockBuffer::new(1, 16);
    io.channel_mut(0).fill(0.9);
    exec.process_block(&mut io, 16, &[], &[], Transport::default());
    for &sample in io.channel(0) {
        assert!((sample - 1.0).abs() < 1e-6, "9.0 driven sample clips to 1.0");
    }
}

#[test]
fn oscillator_square_alternates_with_detune_applied() {
    let (mut iface, mut exec) = engine(48, 1);
    // 12000 Hz square at 48 kHz: two samples high, two low.
    iface.apply_ops([
        add(
            "osc",
            "oscillator",
            &[("waveform", 2.0), ("frequency", 12_000.0), ("gain", 1.0)],
        ),
        set_output("osc"),
    ]);

    let mut io = BlockBuffer::new(1, 48);
    exec.process_block(&mut io, 48, &[], &[], Transport::default());

    let out = io.channel(0);
    assert_eq!(out[0], 1.0);
    assert_eq!(out[1], 1.0);
    assert_eq!(out[2], -1.0);
    assert_eq!(out[3], -1.0);
    assert_eq!(out[4], 1.0);
}
