//! `c`, `C`, `D`, `s` and `S` behavior, plus the reset-on-resume flag.

mod common;

use common::{checksum_data, mock_monitor, run_session, INITIAL_PC};
use gdbmon::{InstructionType, ThreadState};

#[test]
fn continue_skips_over_hardcoded_breakpoint() {
    let mut monitor = mock_monitor();
    monitor.platform_mut().instruction_type = InstructionType::HardcodedBreakpoint;
    run_session(&mut monitor, &["+$c#"]);
    assert_eq!(monitor.comm().sent_text(), checksum_data("$T05responseT#+"));
    assert_eq!(monitor.platform().advance_count, 1);
    assert_eq!(monitor.platform().pc, INITIAL_PC + 4);
}

#[test]
fn continue_does_not_skip_when_pc_was_modified_by_user() {
    let mut monitor = mock_monitor();
    monitor.platform_mut().instruction_type = InstructionType::HardcodedBreakpoint;
    monitor.platform_mut().pc_modified_by_user = true;
    run_session(&mut monitor, &["+$c#"]);
    assert_eq!(monitor.platform().advance_count, 0);
}

#[test]
fn continue_accepts_a_new_program_counter() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$cf00d#"]);
    assert_eq!(monitor.platform().pc, 0xf00d);
    assert_eq!(monitor.platform().advance_count, 0);
}

#[test]
fn continue_with_signal_parses_signal_and_address() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$C0b;f00d#"]);
    assert_eq!(monitor.platform().pc, 0xf00d);
    assert_eq!(monitor.comm().sent_text(), checksum_data("$T05responseT#+"));
}

#[test]
fn continue_with_missing_signal_reports_e01() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$C#", "+$c#"]);
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05responseT#+$E01#+")
    );
    assert_eq!(monitor.platform().pc, INITIAL_PC);
}

#[test]
fn continue_with_missing_address_after_semicolon_reports_e01() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$C0b;#", "+$c#"]);
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05responseT#+$E01#+")
    );
}

#[test]
fn detach_acknowledges_then_resumes() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$D#"]);
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05responseT#+$OK#")
    );
    assert_eq!(monitor.platform().advance_count, 0);
}

#[test]
fn detach_skips_hardcoded_breakpoint_like_continue() {
    let mut monitor = mock_monitor();
    monitor.platform_mut().instruction_type = InstructionType::HardcodedBreakpoint;
    run_session(&mut monitor, &["+$D#"]);
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05responseT#+$OK#")
    );
    assert_eq!(monitor.platform().advance_count, 1);
    assert_eq!(monitor.platform().pc, INITIAL_PC + 4);
}

#[test]
fn basic_single_step_enables_stepping_and_resumes() {
    let mut monitor = mock_monitor();
    assert!(!monitor.platform().single_stepping);
    run_session(&mut monitor, &["+$s#"]);
    assert!(monitor.platform().single_stepping);
    assert_eq!(monitor.comm().sent_text(), checksum_data("$T05responseT#+"));
    assert_eq!(monitor.platform().advance_count, 0);
}

#[test]
fn step_over_hardcoded_breakpoint_synthesizes_a_stop() {
    let mut monitor = mock_monitor();
    monitor.platform_mut().instruction_type = InstructionType::HardcodedBreakpoint;
    run_session(&mut monitor, &["+$s#", "+$c#"]);
    // The advance stands in for the step, so a second stop reply is sent and
    // the session keeps running until the continue.
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05responseT#+$T05responseT#+")
    );
    assert_eq!(monitor.platform().advance_count, 2);
    assert_eq!(monitor.platform().pc, INITIAL_PC + 8);
    assert!(!monitor.platform().single_stepping);
}

#[test]
fn step_with_signal_and_address() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$S0b;f00d#"]);
    assert!(monitor.platform().single_stepping);
    assert_eq!(monitor.platform().pc, 0xf00d);
}

#[test]
fn step_with_missing_signal_reports_e01() {
    let mut monitor = mock_monitor();
    run_session(&mut monitor, &["+$S#", "+$c#"]);
    assert!(!monitor.platform().single_stepping);
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05responseT#+$E01#+")
    );
}

#[test]
fn monitor_reset_fires_on_the_next_continue() {
    let mut monitor = mock_monitor();
    // "reset" hex encoded.
    run_session(&mut monitor, &["+$qRcmd,7265736574#", "++$c#"]);
    assert_eq!(monitor.platform().reset_count, 1);
    assert_eq!(monitor.comm().flush_calls, 1);

    let mut expected = String::from("$T05responseT#+$O");
    for byte in b"Will reset on next continue.\r\n" {
        expected.push_str(&format!("{:02x}", byte));
    }
    expected.push_str("#$OK#+");
    assert_eq!(monitor.comm().sent_text(), checksum_data(&expected));
}

#[test]
fn continue_thaws_all_rtos_threads() {
    let mut monitor = mock_monitor();
    {
        let platform = monitor.platform_mut();
        platform.set_state_supported = true;
        platform.halted_tid = 0xbaadfeed;
        platform.thread_states = vec![
            (0x5a5a5a5a, ThreadState::Frozen),
            (0xbaadf00d, ThreadState::Frozen),
            (0xbaadfeed, ThreadState::Frozen),
        ];
    }
    run_session(&mut monitor, &["+$c#"]);
    let states: Vec<ThreadState> = monitor
        .platform()
        .thread_states
        .iter()
        .map(|(_, s)| *s)
        .collect();
    assert_eq!(
        states,
        vec![ThreadState::Thawed, ThreadState::Thawed, ThreadState::Thawed]
    );
}

#[test]
fn single_step_marks_the_halted_thread_stepping() {
    let mut monitor = mock_monitor();
    {
        let platform = monitor.platform_mut();
        platform.set_state_supported = true;
        platform.halted_tid = 0xbaadfeed;
        platform.thread_states = vec![
            (0x5a5a5a5a, ThreadState::Frozen),
            (0xbaadfeed, ThreadState::Frozen),
        ];
    }
    run_session(&mut monitor, &["+$s#"]);
    let states: Vec<ThreadState> = monitor
        .platform()
        .thread_states
        .iter()
        .map(|(_, s)| *s)
        .collect();
    assert_eq!(
        states,
        vec![ThreadState::Thawed, ThreadState::SingleStepping]
    );
    assert_eq!(
        monitor.comm().sent_text(),
        checksum_data("$T05thread:baadfeed;responseT#+")
    );
}
