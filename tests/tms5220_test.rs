mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use tms52xx::excitation::Excitation;
use tms52xx::frame::FrameParameters;
use tms52xx::vsm::DirectMemory;
use tms52xx::{clock, ChipVariant, ConfigError, OutputPin, Tms5220, Tms5220Config};

/// Two voiced frames and a stop code, 13 bytes: fits the FIFO in one go.
fn short_utterance() -> Vec<u8> {
    let mut writer = BitWriter::new();
    writer.voiced(VOICED_A).voiced(VOICED_B).stop();
    assert_eq!(writer.bits(), 104);
    writer.bytes()
}

/// Alternating voiced frames, longer than the FIFO.
fn long_utterance(pairs: usize) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for _ in 0..pairs {
        writer.voiced(VOICED_A).voiced(VOICED_B);
    }
    writer.stop();
    writer.bytes()
}

/// Count falling edges (assertions) of an active low line.
fn count_assertions() -> (Rc<RefCell<u32>>, impl FnMut(bool)) {
    let count = Rc::new(RefCell::new(0));
    let handle = count.clone();
    (count, move |level: bool| {
        if !level {
            *handle.borrow_mut() += 1;
        }
    })
}

/// Sample index of every frame parse after the utterance starts.
fn frame_parses(chip: &mut Tms5220, data: &[u8]) -> Vec<usize> {
    let mut last = FrameParameters::utterance_start();
    let mut parses = Vec::new();
    speak_external_with(chip, data, 10_000, |chip, index| {
        if chip.new_frame() != last {
            last = chip.new_frame();
            parses.push(index);
        }
    });
    parses
}

fn intervals(parses: &[usize]) -> Vec<usize> {
    parses.windows(2).map(|w| w[1] - w[0]).collect()
}

#[test]
fn power_on_is_idle() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    assert!(!chip.read_ready(), "READY should be active at power on");
    assert!(chip.read_interrupt(), "no interrupt at power on");
    assert_eq!(chip.read(), 0x60, "BL and BE set, not talking");
    let mut buffer = [0i16; 400];
    chip.process(&mut buffer);
    assert!(buffer.iter().all(|&s| s == -1), "idle output is -1");
}

/// READY goes inactive when the FIFO fills in speak external mode and comes
/// back once the parser frees a byte.
#[test]
fn ready_follows_fifo_fullness() {
    let data = long_utterance(4);
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let levels = Rc::new(RefCell::new(Vec::new()));
    let handle = levels.clone();
    chip.set_ready_handler(move |level| handle.borrow_mut().push(level));

    chip.write(SPEAK_EXTERNAL);
    for &byte in &data[..16] {
        chip.write(byte);
    }
    assert_eq!(chip.fifo_len(), 16);
    assert!(chip.read_ready(), "READY should be inactive with a full FIFO");
    assert_eq!(*levels.borrow(), vec![true]);
    assert!(chip.cycles_to_ready() > 0);
    assert!(chip.time_to_ready() > 0.0);

    chip.write(data[16]);
    assert_eq!(chip.fifo_len(), 16, "write to a full FIFO must be dropped");

    let mut samples = 0;
    while chip.read_ready() {
        step(&mut chip);
        samples += 1;
        assert!(samples < 1000, "READY never came back");
    }
    assert!(chip.fifo_len() < 16);
    assert_eq!(chip.cycles_to_ready(), 0);
    assert_eq!(*levels.borrow(), vec![true, false]);
}

/// A stop frame drops TALK_STATUS within one frame and raises exactly one
/// interrupt for it.
#[test]
fn stop_frame_raises_one_interrupt() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let (irqs, handler) = count_assertions();
    chip.set_irq_handler(handler);

    chip.write(SPEAK_EXTERNAL);
    for byte in short_utterance() {
        chip.write(byte);
    }
    assert!(chip.talk_state().spen, "FIFO past half full starts speech");

    let mut samples = 0;
    while !chip.new_frame().is_stop() {
        step(&mut chip);
        samples += 1;
        assert!(samples < 2000, "stop frame never parsed");
    }
    assert!(!chip.talk_state().spen);
    assert!(chip.talk_state().talkd, "TALKD holds until the frame ends");

    // Acknowledge the FIFO interrupts raised while draining.
    chip.read();
    assert!(chip.read_interrupt());
    *irqs.borrow_mut() = 0;

    let tail = run_until_silent(&mut chip, 1000);
    assert!(tail.len() <= 200, "talk status took {} samples", tail.len());
    assert_eq!(*irqs.borrow(), 1, "exactly one interrupt at end of speech");
    assert!(!chip.read_interrupt());
    assert!(!chip.talk_state().ddis, "end of speech leaves speak external");
    assert_eq!(chip.read() & 0x80, 0);
    assert!(chip.read_interrupt(), "status read clears the interrupt");
}

/// BL rising while the FIFO drains raises an interrupt.
#[test]
fn buffer_low_interrupt() {
    let data = long_utterance(2);
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    for &byte in &data[..12] {
        chip.write(byte);
    }
    assert_eq!(chip.read() & 0x60, 0, "neither BL nor BE with 12 bytes");
    assert!(chip.read_interrupt());

    let mut samples = 0;
    while chip.fifo_len() > 8 {
        step(&mut chip);
        samples += 1;
        assert!(samples < 1000);
    }
    assert!(!chip.read_interrupt());
    assert_eq!(chip.read() & 0xc0, 0xc0, "talking with BL set");
    assert!(chip.read_interrupt());
}

/// Unvoiced frames excite the filter from the noise generator.
#[test]
fn unvoiced_frames_produce_noise() {
    let mut writer = BitWriter::new();
    for _ in 0..6 {
        writer.unvoiced(14, [10, 20, 8, 8]);
    }
    writer.stop();

    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let mut sources = Vec::new();
    let out = speak_external_with(&mut chip, &writer.bytes(), 5000, |chip, _| {
        sources.push(chip.excitation_source());
    });
    assert!(!chip.talk_state().talk_status(), "utterance should finish");
    assert!(sources.iter().all(|&s| s == Excitation::Noise));

    let active: Vec<i16> = out.iter().copied().filter(|&s| s != -1).collect();
    assert!(active.len() > 400, "only {} active samples", active.len());
    assert!(active.iter().any(|&s| s > 0));
    assert!(active.iter().any(|&s| s < 0));
    let mut distinct = active.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert!(distinct.len() > 20, "noise too regular: {:?}", distinct);
}

/// Voiced frames switch the excitation to the chirp.
#[test]
fn voiced_frames_use_chirp() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let mut chirp = 0;
    speak_external_with(&mut chip, &long_utterance(2), 5000, |chip, _| {
        if chip.excitation_source() == Excitation::Chirp {
            chirp += 1;
        }
    });
    assert!(chirp > 400, "chirp excitation for {} samples", chirp);
}

/// Identical input gives identical samples and state.
#[test]
fn output_is_deterministic() {
    let data = long_utterance(3);
    let mut a = Tms5220::new(ChipVariant::Tms5220);
    let mut b = Tms5220::new(ChipVariant::Tms5220);
    let out_a = speak_external(&mut a, &data, 5000);
    let out_b = speak_external(&mut b, &data, 5000);
    assert_eq!(out_a, out_b);
    assert_eq!(a.read_state(), b.read_state());
    assert!(out_a.iter().any(|&s| s != -1), "utterance was silent");
}

/// A chip restored from a snapshot continues exactly like the original.
#[test]
fn snapshot_resumes_identically() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    for byte in short_utterance() {
        chip.write(byte);
    }
    let mut head = [0i16; 600];
    chip.process(&mut head);
    chip.clock_delta(33);

    let mut copy = Tms5220::new(ChipVariant::Tms5220);
    copy.write_state(&chip.read_state());
    assert_eq!(copy.read_state(), chip.read_state());

    let rest_a = run_until_silent(&mut chip, 2000);
    let rest_b = run_until_silent(&mut copy, 2000);
    assert_eq!(rest_a, rest_b);
    assert_eq!(copy.read_state(), chip.read_state());
}

/// A repeat frame takes new energy and pitch but keeps the coefficients.
#[test]
fn repeat_frame_keeps_coefficients() {
    let mut writer = BitWriter::new();
    writer.voiced(VOICED_A).repeat(9, 50).voiced(VOICED_B).stop();

    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let mut frames: Vec<FrameParameters> = Vec::new();
    speak_external_with(&mut chip, &writer.bytes(), 5000, |chip, _| {
        if frames.last() != Some(&chip.new_frame()) {
            frames.push(chip.new_frame());
        }
    });
    let repeat = frames
        .iter()
        .find(|f| f.energy == 9)
        .expect("repeat frame parsed");
    assert_eq!(repeat.pitch, 50);
    assert_eq!(repeat.k, VOICED_A.2);
}

/// Frames last 200 samples at the default rate.
#[test]
fn frame_period_is_200_samples() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(0x01);
    assert_eq!(chip.rate(), 0, "TMS5220 has no rate register");
    let parses = frame_parses(&mut chip, &long_utterance(2));
    assert_eq!(parses.len(), 5);
    assert_eq!(intervals(&parses), vec![200; 4]);
}

/// SET RATE shortens frames on the TMS5220C.
#[test]
fn set_rate_shortens_frames() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220C);
    chip.write(0x21);
    assert_eq!(chip.rate(), 1);
    let parses = frame_parses(&mut chip, &long_utterance(2));
    assert_eq!(intervals(&parses), vec![150; 4]);
}

/// In variable rate mode each frame carries its own 2-bit rate.
#[test]
fn variable_rate_frames() {
    let mut writer = BitWriter::new();
    writer.rate(3).voiced(VOICED_A);
    writer.rate(1).voiced(VOICED_B);
    writer.rate(0).voiced(VOICED_A);
    writer.rate(2).voiced(VOICED_B);
    writer.rate(0).stop();

    let mut chip = Tms5220::new(ChipVariant::Tms5220C);
    chip.write(0x04);
    assert_eq!(chip.rate(), 4);
    let parses = frame_parses(&mut chip, &writer.bytes());
    assert_eq!(intervals(&parses), vec![50, 150, 200, 100]);
}

/// Strobed writes and reads complete 16 clocks after the strobe falls.
#[test]
fn true_timing_access() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write_strobe(true);
    chip.write(SPEAK_EXTERNAL);
    assert!(!chip.talk_state().ddis, "true timing only latches");

    chip.write_strobe(false);
    assert!(chip.read_ready(), "READY drops with the strobe");
    chip.clock_delta(15);
    assert!(chip.read_ready());
    chip.clock_delta(1);
    assert!(!chip.read_ready());
    assert!(chip.talk_state().ddis, "latched write serviced");
    chip.write_strobe(true);

    assert_eq!(chip.read(), 0xff, "no read without /RS");
    chip.read_strobe(false);
    chip.clock_delta(16);
    assert_eq!(chip.read(), 0x60);
    chip.read_strobe(true);
    assert_eq!(chip.read(), 0xff);
}

fn strobed_write(chip: &mut Tms5220, byte: u8) {
    chip.write(byte);
    chip.write_strobe(false);
    chip.clock_delta(16);
    chip.write_strobe(true);
}

/// A strobed write into a full FIFO holds READY until there is room.
#[test]
fn true_timing_full_fifo_holds_ready() {
    let data = long_utterance(3);
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    chip.write_strobe(true);
    for &byte in &data[..16] {
        strobed_write(&mut chip, byte);
    }
    assert_eq!(chip.fifo_len(), 16);

    chip.write(data[16]);
    chip.write_strobe(false);
    chip.clock_delta(16);
    assert!(chip.read_ready(), "write into a full FIFO keeps READY inactive");
    assert_eq!(chip.fifo_len(), 16);

    let mut samples = 0;
    while chip.read_ready() {
        chip.clock_delta(clock::CYCLES_PER_SAMPLE);
        samples += 1;
        assert!(samples < 1000, "held write never completed");
    }
    chip.write_strobe(true);
    assert!(chip.fifo_len() < 16);
}

#[test]
fn both_strobes_low_resets_rate_chips() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220C);
    chip.write(SPEAK_EXTERNAL);
    chip.write_strobe(false);
    chip.read_strobe(false);
    assert!(!chip.talk_state().ddis, "TMS5220C resets");

    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    chip.write_strobe(false);
    chip.read_strobe(false);
    assert!(chip.talk_state().ddis, "TMS5220 ignores both strobes low");
}

#[test]
fn reset_returns_to_idle() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    for byte in short_utterance() {
        chip.write(byte);
    }
    let mut buffer = [0i16; 700];
    chip.process(&mut buffer);
    assert!(chip.talk_state().talk_status());

    chip.reset();
    assert_eq!(chip.fifo_len(), 0);
    assert!(!chip.talk_state().talk_status());
    assert!(!chip.talk_state().ddis);
    assert_eq!(chip.read(), 0x60);
    assert_eq!(step(&mut chip), -1);
}

/// RESET command from the idle state.
#[test]
fn reset_command() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220C);
    chip.write(0x22);
    chip.write(0x70);
    assert_eq!(chip.rate(), 2, "rate register survives reset");
    assert_eq!(chip.read(), 0x60);
}

/// The digital pin path gives different samples from the analog clipper.
#[test]
fn output_pin_selection() {
    let data = long_utterance(2);
    let mut analog = Tms5220::new(ChipVariant::Tms5220);
    let mut digital = Tms5220::from_config(Tms5220Config {
        output_pin: OutputPin::Digital,
        ..Tms5220Config::default()
    })
    .unwrap();
    assert_eq!(digital.output_pin(), OutputPin::Digital);
    let a = speak_external(&mut analog, &data, 5000);
    let d = speak_external(&mut digital, &data, 5000);
    assert_eq!(a.len(), d.len());
    assert_ne!(a, d);
}

/// `sample` reports leftover cycles when the buffer fills.
#[test]
fn sample_returns_remaining_cycles() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let mut buffer = [0i16; 10];
    let (samples, remaining) = chip.sample(80 * 12 + 5, &mut buffer);
    assert_eq!((samples, remaining), (10, 80 * 2 + 5));
    let (samples, remaining) = chip.sample(80 * 2 + 5, &mut buffer);
    assert_eq!((samples, remaining), (2, 0));
    let (samples, remaining) = chip.sample(75, &mut buffer);
    assert_eq!((samples, remaining), (1, 0));
}

#[test]
fn config_validation() {
    assert_eq!(
        Tms5220::from_config(Tms5220Config {
            clock_freq: 0,
            ..Tms5220Config::default()
        })
        .err(),
        Some(ConfigError::ZeroClockFreq)
    );

    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    assert_eq!(chip.sample_rate(), 8000);
    assert_eq!(chip.set_frequency(0), Err(ConfigError::ZeroClockFreq));
    assert_eq!(chip.set_frequency(clock::TMS5220_10KHZ), Ok(()));
    assert_eq!(chip.sample_rate(), 10_000);
}

#[test]
fn variant_names() {
    assert_eq!("TMS5220C".parse(), Ok(ChipVariant::Tms5220C));
    assert_eq!("cd2501e".parse(), Ok(ChipVariant::Cd2501e));
    assert_eq!(
        "tms9918".parse::<ChipVariant>(),
        Err(ConfigError::UnknownVariant("tms9918".to_string()))
    );
    for variant in [
        ChipVariant::Tms5220,
        ChipVariant::Tms5220C,
        ChipVariant::Tms5200,
        ChipVariant::Cd2501e,
        ChipVariant::Cd2501ecd,
    ] {
        assert_eq!(variant.name().parse(), Ok(variant));
    }
}

/// The TMS5200 plays through its own coefficient ROM.
#[test]
fn tms5200_differs_from_tms5220() {
    let data = long_utterance(2);
    let a = speak_external(&mut Tms5220::new(ChipVariant::Tms5220), &data, 5000);
    let b = speak_external(&mut Tms5220::new(ChipVariant::Tms5200), &data, 5000);
    assert_ne!(a, b);
}

/// RESET with an interrupt pending releases /INT through the handler.
#[test]
fn reset_releases_interrupt_line() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let irq_levels = Rc::new(RefCell::new(Vec::new()));
    let handle = irq_levels.clone();
    chip.set_irq_handler(move |level| handle.borrow_mut().push(level));
    let ready_levels = Rc::new(RefCell::new(Vec::new()));
    let handle = ready_levels.clone();
    chip.set_ready_handler(move |level| handle.borrow_mut().push(level));

    chip.write(SPEAK_EXTERNAL);
    for byte in short_utterance() {
        chip.write(byte);
    }
    run_until_silent(&mut chip, 2000);
    assert!(!chip.read_interrupt(), "end of speech leaves /INT asserted");
    assert_eq!(irq_levels.borrow().last(), Some(&false));
    let ready_before = ready_levels.borrow().len();

    chip.write(0x70);
    assert!(chip.read_interrupt());
    assert_eq!(irq_levels.borrow().last(), Some(&true), "/INT release not reported");
    assert_eq!(ready_levels.borrow().len(), ready_before, "READY did not change");
}

/// Stale energy from the previous utterance does not reach the filter
/// while the parameters are held at zero.
#[test]
fn new_utterance_starts_from_zero_energy() {
    let mut first = BitWriter::new();
    first.voiced(VOICED_A).voiced((14, 44, VOICED_B.2)).stop();
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    speak_external(&mut chip, &first.bytes(), 5000);
    assert!(!chip.talk_state().talk_status());
    assert_ne!(
        chip.read_state().excitation.previous_energy(),
        0,
        "energy should still be decaying when the first utterance ends"
    );

    let mut zeroed = 0;
    speak_external_with(&mut chip, &short_utterance(), 5000, |chip, index| {
        let state = chip.read_state();
        if state.talk.talkd && state.interpolator.zpar() {
            zeroed += 1;
            assert_eq!(state.filter.u()[10], 0, "filter input at sample {}", index);
        }
    });
    assert!(zeroed > 0, "no samples spoken with parameters zeroed");
}

/// LOAD ADDRESS holds READY until its dummy read, done on the next clock.
#[test]
fn load_address_holds_ready_for_dummy_read() {
    let rom = vec![0x00, 0xa5];
    let mut chip = Tms5220::new(ChipVariant::Tms5220).with_memory(DirectMemory::new(rom));
    let levels = Rc::new(RefCell::new(Vec::new()));
    let handle = levels.clone();
    chip.set_ready_handler(move |level| handle.borrow_mut().push(level));
    assert!(!chip.read_ready());

    chip.write(LOAD_ADDRESS | 1);
    assert!(chip.read_ready(), "READY should be inactive with a dummy read pending");
    assert_eq!(chip.cycles_to_ready(), 1);
    assert_eq!(*levels.borrow(), vec![true]);

    chip.clock();
    assert!(!chip.read_ready());
    assert_eq!(*levels.borrow(), vec![true, false]);
}

/// Three unvoiced frames at energy index 5 with every K index zero,
/// then a stop code.
fn quiet_noise() -> Vec<u8> {
    let mut writer = BitWriter::new();
    for _ in 0..3 {
        writer.unvoiced(5, [0, 0, 0, 0]);
    }
    writer.stop();
    assert_eq!(writer.bits(), 91);
    writer.bytes()
}

/// Quiet unvoiced frames with all-zero coefficient indices still sound:
/// noise of both signs reaches the pin.
#[test]
fn quiet_unvoiced_frames_are_audible() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    let mut sources = Vec::new();
    let out = speak_external_with(&mut chip, &quiet_noise(), 5000, |chip, _| {
        if chip.talk_state().talkd {
            sources.push(chip.excitation_source());
        }
    });
    assert!(!chip.talk_state().talk_status(), "utterance should finish");
    assert!(sources.iter().all(|&s| s == Excitation::Noise));
    let active: Vec<i16> = out.iter().copied().filter(|&s| s != -1).collect();
    assert!(active.iter().any(|&s| s > 0));
    assert!(active.iter().any(|&s| s < 0));
}

/// Exact analog pin samples for the quiet noise utterance.
#[test]
fn quiet_noise_samples() {
    let data = quiet_noise();
    assert_eq!(
        data,
        [0x0a, 0x00, 0x00, 0x40, 0x01, 0x00, 0x00, 0x28, 0x00, 0x00, 0x80, 0x07]
    );
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    for byte in data {
        chip.write(byte);
    }
    let mut out = [0i16; 640];
    chip.process(&mut out);

    assert!(out[..400].iter().all(|&s| s == -1), "idle before the first frame");
    assert!(out[400..602].iter().all(|&s| s == 0), "first frame interpolates from zero");
    assert_eq!(
        out[600..632],
        [
            0, 0, -517, -517, -517, -1291, -517, -259, 0, 0, 258, 258, -775, 258, -259, -775,
            1032, -517, 0, 1290, 0, 516, 1548, 258, -259, 1548, -259, 1290, 1032, -775, 2580,
            -775,
        ]
    );
}

/// Out of range frame indices in a snapshot are truncated on restore.
#[test]
fn snapshot_frame_indices_are_masked() {
    let mut chip = Tms5220::new(ChipVariant::Tms5220);
    chip.write(SPEAK_EXTERNAL);
    for byte in short_utterance() {
        chip.write(byte);
    }
    let mut head = [0i16; 500];
    chip.process(&mut head);

    let mut state = chip.read_state();
    state.new_frame = FrameParameters {
        energy: 0xff,
        pitch: 0xff,
        k: [0xff; 10],
    };
    let mut copy = Tms5220::new(ChipVariant::Tms5220);
    copy.write_state(&state);
    assert_eq!(copy.new_frame().energy, 0x0f);
    assert_eq!(copy.new_frame().pitch, 0x3f);
    let mut rest = [0i16; 300];
    copy.process(&mut rest);
}
