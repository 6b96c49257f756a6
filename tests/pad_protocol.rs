use snespad::bus::{BusPins, PinMode, SimDevice, SimKeyboard, SimMouse, SimulatedBus};
use snespad::pad::device::{
    ControllerState, MouseSpeed, KEYBOARD_ID, SNES_A, SNES_B, SNES_DOWN, SNES_L, SNES_LEFT,
    SNES_R, SNES_SELECT, SNES_START, SNES_UP, SNES_X, SNES_Y,
};
use snespad::pad::{DeviceType, PadReport, PadSettings, Phase, Ready, SnesPad};

fn pad_with(device: SimDevice) -> (SnesPad<Ready>, SimulatedBus) {
    let bus = SimulatedBus::with_device(BusPins::default(), device);
    let pad = SnesPad::create(BusPins::default(), Box::new(bus.clone()), None)
        .begin()
        .unwrap();
    (pad, bus)
}

fn assert_idle(state: &ControllerState) {
    assert_eq!(*state, ControllerState::default());
}

#[test]
fn begin_configures_directions() {
    let (_pad, bus) = pad_with(SimDevice::Disconnected);
    let pins = BusPins::default();

    assert_eq!(bus.pin_mode(pins.clock), Some(PinMode::Output));
    assert_eq!(bus.pin_mode(pins.latch), Some(PinMode::Output));
    assert_eq!(bus.pin_mode(pins.iobit), Some(PinMode::Output));
    assert_eq!(bus.pin_mode(pins.data0), Some(PinMode::InputPullUp));
    assert_eq!(bus.pin_mode(pins.data1), Some(PinMode::InputPullUp));
}

#[test]
fn empty_port_stays_undetected() {
    let (mut pad, _bus) = pad_with(SimDevice::Disconnected);

    pad.start();
    assert_eq!(pad.device_type(), DeviceType::None);
    assert_eq!(pad.phase(), Phase::Detecting);
    assert_idle(pad.controller());

    pad.poll();
    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::None);
    assert_eq!(pad.report(), PadReport::None);
    assert!(pad.scancodes().is_empty());
}

#[test]
fn controller_buttons_decode() {
    let (mut pad, _bus) = pad_with(SimDevice::Controller {
        pressed: (SNES_B | SNES_START) as u16,
    });

    pad.start();
    assert_eq!(pad.phase(), Phase::Tracking(DeviceType::Controller));
    // detection alone leaves the baseline cleared
    assert_idle(pad.controller());

    pad.poll();
    let state = pad.controller();
    assert!(state.b);
    assert!(state.start);
    assert!(!state.a && !state.x && !state.y && !state.l && !state.r && !state.select);
    assert!(!state.up && !state.down && !state.left && !state.right);
}

#[test]
fn controller_without_buttons_stays_connected() {
    let (mut pad, _bus) = pad_with(SimDevice::Controller { pressed: 0 });

    pad.start();
    for _ in 0..3 {
        pad.poll();
        assert_eq!(pad.device_type(), DeviceType::Controller);
        assert!(!pad.controller().any());
    }
}

#[test]
fn every_controller_button_maps_to_its_bit() {
    let (mut pad, bus) = pad_with(SimDevice::Controller { pressed: 0 });
    pad.start();

    let masks = [
        SNES_A, SNES_B, SNES_X, SNES_Y, SNES_L, SNES_R, SNES_START, SNES_SELECT, SNES_UP,
        SNES_DOWN, SNES_LEFT,
    ];
    for mask in masks {
        bus.attach(SimDevice::Controller {
            pressed: mask as u16,
        });
        pad.poll();
        assert_eq!(*pad.controller(), ControllerState::from_snes(mask));
    }
}

#[test]
fn unplugging_returns_to_detection() {
    let (mut pad, bus) = pad_with(SimDevice::Controller {
        pressed: SNES_A as u16,
    });
    pad.start();
    pad.poll();
    assert!(pad.controller().a);

    bus.detach();
    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::None);
    // fields are left as they were, callers must look at the device type
    assert!(pad.controller().a);

    bus.attach(SimDevice::Controller { pressed: 0 });
    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::Controller);
    assert_idle(pad.controller());
}

#[test]
fn nes_pad_remaps_buttons() {
    // NES A sits on bit 0, NES B on bit 1
    let (mut pad, _bus) = pad_with(SimDevice::Nes { pressed: 0b0000_0010 | 0x08 });

    pad.start();
    assert_eq!(pad.device_type(), DeviceType::Nes);

    pad.poll();
    let state = pad.controller();
    assert!(state.b);
    assert!(!state.a);
    assert!(state.start);
    assert!(!state.select);
    assert!(matches!(pad.report(), PadReport::Nes(_)));
}

#[test]
fn mouse_motion_and_buttons() {
    let mouse = SimMouse {
        primary: true,
        dx: 5,
        dy: -3,
        speed: MouseSpeed::Fast,
        ..Default::default()
    };
    let (mut pad, _bus) = pad_with(SimDevice::Mouse(mouse));

    pad.start();
    assert_eq!(pad.device_type(), DeviceType::Mouse);
    assert_eq!(pad.mouse().x, 0);

    pad.poll();
    let state = pad.mouse();
    // the wire magnitude is reversed as a whole byte, doubling it
    assert_eq!(state.x, 127 + 10);
    assert_eq!(state.y, 127 - 6);
    assert!(state.primary);
    assert!(!state.secondary);
    assert!(pad.controller().a);
    assert!(!pad.controller().b);
}

#[test]
fn mouse_speed_is_negotiated_to_fast() {
    let (mut pad, bus) = pad_with(SimDevice::Mouse(SimMouse::default()));

    pad.start();
    assert_eq!(bus.speed_requests(), 0);
    assert_eq!(pad.mouse().speed_fails, 1);

    pad.poll();
    assert_eq!(pad.mouse().speed, MouseSpeed::Medium);
    pad.poll();
    assert_eq!(pad.mouse().speed, MouseSpeed::Fast);
    assert_eq!(bus.speed_requests(), 2);

    for _ in 0..5 {
        pad.poll();
    }
    assert_eq!(bus.speed_requests(), 2);
    assert_eq!(pad.mouse().speed, MouseSpeed::Fast);
}

#[test]
fn stubborn_mouse_stops_speed_requests() {
    let mouse = SimMouse {
        honours_speed_requests: false,
        ..Default::default()
    };
    let (mut pad, bus) = pad_with(SimDevice::Mouse(mouse));

    pad.start();
    for _ in 0..30 {
        pad.poll();
    }

    assert_eq!(pad.mouse().speed_fails, 10);
    assert_eq!(pad.mouse().speed, MouseSpeed::Slow);
    // one request per poll until the counter reached the threshold
    assert_eq!(bus.speed_requests(), 9);
}

#[test]
fn unplugged_mouse_forgets_speed_negotiation() {
    let stubborn = SimMouse {
        honours_speed_requests: false,
        ..Default::default()
    };
    let (mut pad, bus) = pad_with(SimDevice::Mouse(stubborn.clone()));

    pad.start();
    for _ in 0..15 {
        pad.poll();
    }
    assert_eq!(pad.mouse().speed_fails, 10);

    bus.detach();
    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::None);
    assert_eq!(pad.mouse().speed_fails, 0);
    assert_eq!(pad.mouse().speed, MouseSpeed::Slow);

    bus.attach(SimDevice::Mouse(stubborn));
    let before = bus.speed_requests();
    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::Mouse);
    pad.poll();
    assert_eq!(bus.speed_requests(), before + 1);
}

#[test]
fn large_mouse_precision_does_not_overflow() {
    let mouse = SimMouse {
        dx: 127,
        dy: -127,
        speed: MouseSpeed::Fast,
        ..Default::default()
    };
    let bus = SimulatedBus::with_device(BusPins::default(), SimDevice::Mouse(mouse));
    let settings = PadSettings {
        mouse_precision: 200,
        ..Default::default()
    };
    let mut pad = SnesPad::create(BusPins::default(), Box::new(bus.clone()), Some(settings))
        .begin()
        .unwrap();

    pad.start();
    pad.poll();
    // the 7-bit field 0x7F reverses to 254
    assert_eq!(pad.mouse().x, 127 + 254 * 200);
    assert_eq!(pad.mouse().y, 127 - 254 * 200);
}

#[test]
fn unknown_device_id_is_not_tracked() {
    // device id nibble 0x3, data0 held low before latch
    let frame = !(0x3000u32);
    let (mut pad, _bus) = pad_with(SimDevice::Raw {
        frame,
        idle_level: false,
    });

    pad.start();
    assert_eq!(pad.device_type(), DeviceType::None);
}

#[test]
fn keyboard_is_detected_and_reports_scancodes() {
    let (mut pad, bus) = pad_with(SimDevice::Keyboard(SimKeyboard::new()));

    pad.start();
    assert_eq!(pad.device_type(), DeviceType::Keyboard);

    bus.update(|device| {
        if let SimDevice::Keyboard(keyboard) = device {
            keyboard.queue(&[0x1C, 0xF0, 0x1C]);
        }
    });
    pad.poll();
    assert_eq!(pad.scancodes(), &[0x1C, 0xF0, 0x1C]);
    assert_eq!(
        pad.report(),
        PadReport::Keyboard {
            scancodes: vec![0x1C, 0xF0, 0x1C]
        }
    );

    // nothing new this cycle
    pad.poll();
    assert!(pad.scancodes().is_empty());
    assert_eq!(pad.device_type(), DeviceType::Keyboard);
}

#[test]
fn keyboard_signature_off_by_one_is_healed_once_tracked() {
    let (mut pad, bus) = pad_with(SimDevice::Keyboard(SimKeyboard::new()));
    pad.start();
    assert_eq!(pad.device_type(), DeviceType::Keyboard);

    let mut glitched = SimKeyboard::with_id(KEYBOARD_ID + 1);
    glitched.queue(&[0x29]);
    bus.attach(SimDevice::Keyboard(glitched));

    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::Keyboard);
    assert_eq!(pad.scancodes(), &[0x29]);
}

#[test]
fn keyboard_resyncs_after_slipped_dibit() {
    let (mut pad, bus) = pad_with(SimDevice::Keyboard(SimKeyboard::new()));
    pad.start();

    // signature arrives one dibit early as 0x1E, then count 2 and 0x1C, 0x2A
    let mut dibits = vec![0b10, 0b11, 0b01];
    dibits.extend([0b10, 0b00]);
    dibits.extend([0b00, 0b11, 0b01, 0b00]);
    dibits.extend([0b10, 0b10, 0b10, 0b00]);
    bus.attach(SimDevice::Keyboard(SimKeyboard::from_dibits(dibits)));

    pad.poll();
    assert_eq!(pad.device_type(), DeviceType::Keyboard);
    assert_eq!(pad.scancodes(), &[0x1C, 0x2A]);
}

#[test]
fn caps_lock_changes_iobit_sequence() {
    let (mut pad, bus) = pad_with(SimDevice::Keyboard(SimKeyboard::new()));
    pad.start();

    bus.clear_iobit_writes();
    pad.poll();
    assert_eq!(bus.iobit_writes(), vec![false, true, true]);

    pad.set_caps_lock_led(true);
    assert!(pad.caps_locked());
    bus.clear_iobit_writes();
    pad.poll();
    assert_eq!(bus.iobit_writes(), vec![false, true]);
}

#[test]
fn rumble_frame_goes_out_on_iobit() {
    let (mut pad, bus) = pad_with(SimDevice::Controller { pressed: 0 });
    pad.start();

    pad.set_rumble(0x20, 0xC0);
    assert_eq!(pad.rumble().frame(), 0x72C2);

    bus.clear_iobit_writes();
    pad.poll();

    let writes = bus.iobit_writes();
    // 16 data clocks carry one full frame, then the keyboard probe
    let frame = writes[..16]
        .iter()
        .fold(0u16, |acc, &bit| (acc << 1) | u16::from(bit));
    assert_eq!(frame, 0x72C2);
    assert_eq!(pad.rumble().cursor(), 15);

    // repeating the same intensities is a no-op
    pad.set_rumble(0x2F, 0xCF);
    assert_eq!(pad.rumble().frame(), 0x72C2);

    // and switching off keeps the all-off frame on the wire
    pad.set_rumble(0, 0);
    bus.clear_iobit_writes();
    pad.poll();
    assert!(pad.rumble().is_active());
    assert!(bus.iobit_writes()[..16]
        .iter()
        .zip(format!("{:016b}", 0x7200u16).chars())
        .all(|(&bit, c)| bit == (c == '1')));
}

#[test]
fn controller_read_takes_bounded_time() {
    let (mut pad, bus) = pad_with(SimDevice::Controller { pressed: 0 });
    pad.start();

    let before = bus.elapsed_us();
    pad.poll();
    let spent = bus.elapsed_us() - before;

    // latch 24µs, 16 bits and 6 keyboard dibits at 24µs each
    assert_eq!(spent, 24 + 16 * 24 + 6 * 24);
}
