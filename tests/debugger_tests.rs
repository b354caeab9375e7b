use assert_cmd::Command;
use predicates::str::contains;

fn debug(file: &str) -> Command {
    let mut cmd = Command::cargo_bin("masm").unwrap();
    cmd.arg("debug").arg(file).arg("--minimal");
    cmd
}

#[test]
fn debugs_countdown() {
    debug("tests/files/countdown.s")
        .arg("--command")
        .arg(include_str!("commands/countdown"))
        .assert()
        .success()
        .stderr(contains("Executed 2 instructions."))
        .stderr(contains("GR0 2\n"))
        .stderr(contains("PC 2\n"))
        .stderr(contains("Reached breakpoint at 5. Pausing execution."))
        .stderr(contains("   8: 0b000000000000000000000000\n"))
        .stderr(contains("   9: (empty)\n"))
        .stderr(contains("Z:1 N:0 C:0 V:0"))
        .stderr(contains("   1  loop\n"))
        .stderr(contains("   5  done\n"));
}

#[test]
fn reads_commands_from_stdin() {
    debug("tests/files/countdown.s")
        .write_stdin("step 3\nget GR0; get 8\n")
        .assert()
        .success()
        .stderr(contains("Executed 3 instructions."))
        .stderr(contains("2\n3 ; start value\n"));
}

#[test]
fn prints_help_message() {
    debug("tests/files/countdown.s")
        .arg("--command")
        .arg("help")
        .assert()
        .success()
        .stderr(contains("DEBUGGER COMMANDS"))
        .stderr(contains("break list"));
}

#[test]
fn reports_bad_commands() {
    debug("tests/files/countdown.s")
        .arg("--command")
        .arg("jump 4; step 0; get")
        .assert()
        .success()
        .stderr(contains("Unknown command `jump`"))
        .stderr(contains("`step`: step count must be at least 1, found 0"))
        .stderr(contains("`get`: expected a register, memory address, label or section"));
}

#[test]
fn reports_execution_errors() {
    debug("tests/files/data_at_pc.s")
        .arg("--command")
        .arg("step; get PC")
        .assert()
        .success()
        .stderr(contains("Error: Unsupported instruction"))
        .stderr(contains("0\n"));
}

#[test]
fn shows_source_around_pc() {
    debug("tests/files/countdown.s")
        .arg("--command")
        .arg("step; source")
        .assert()
        .success()
        .stderr(contains("->    1: SUB GR0, 1I  (loop:)"))
        .stderr(contains("      5: BRA done ;b  (done:)"));
}

#[test]
fn resets_machine() {
    debug("tests/files/countdown.s")
        .arg("--command")
        .arg("continue; reset; get PC")
        .assert()
        .success()
        .stderr(contains("Reset program to initial state."));
}

#[test]
fn rejects_bad_source() {
    debug("tests/files/undefined_macro.s")
        .arg("--command")
        .arg("quit")
        .assert()
        .failure()
        .stderr(contains("Unknown macro `_MISSING`"));
}

#[test]
fn shows_source_far_outside_memory() {
    debug("tests/files/spin.s")
        .arg("--command")
        .arg("source 9223372036854775807; source -9223372036854775808; get PC")
        .assert()
        .success()
        .stdout(contains("Completed"));
}

#[test]
fn reports_unknown_names() {
    debug("tests/files/countdown.s")
        .arg("--command")
        .arg("get nowhere; source nowhere")
        .assert()
        .success()
        .stderr(contains(
            "Error: Unknown section `nowhere`, and no label has that name",
        ));
}

#[test]
fn names_section_of_address() {
    Command::cargo_bin("masm")
        .unwrap()
        .arg("debug")
        .arg("tests/files/countdown.s")
        .arg("--command")
        .arg("get 9; get 4000")
        .assert()
        .success()
        .stderr(contains("Memory at address 9 (section `VARS`, offset 1):"))
        .stderr(contains("Memory at address 4000, outside any section:"));
}
