use crate::correlator::commands::{force_stop, list_devices, list_packages, list_processes};

use models::CommandTag;

/// **VALUE**: Verifies device-scoped commands target the serial before the remote command.
///
/// **WHY THIS MATTERS**: With more than one device attached, a command without `-s <serial>`
/// fails, and one with the serial after `shell` is sent to the device as a shell argument.
///
/// **BUG THIS CATCHES**: Would catch the serial flag being appended instead of prepended.
#[test]
fn given_serial_when_building_device_commands_then_serial_precedes_shell() {
    // GIVEN: A selected device
    let serial = "R58M";

    // WHEN: Building the device-scoped commands
    let ps = list_processes(serial);
    let pm = list_packages(serial);
    let kill = force_stop(serial, "com.example.app");

    // THEN: Each starts with `-s <serial> shell` and carries its tag
    for (command, tag) in [(&ps, CommandTag::Ps), (&pm, CommandTag::Pm), (&kill, CommandTag::Kill)] {
        assert_eq!(command.tag, tag);
        assert_eq!(&command.argv[..3], &["-s", "R58M", "shell"]);
    }

    assert_eq!(&pm.argv[3..], &["pm", "list", "packages", "-3"]);
    assert_eq!(&kill.argv[3..], &["am", "force-stop", "com.example.app"]);
    assert_eq!(&ps.argv[3..8], &["ps", "-A", "-o", "NAME,PID", "|"]);
}

#[test]
fn given_nothing_when_building_device_listing_then_no_serial_is_needed() {
    // GIVEN/WHEN: The device listing command
    let command = list_devices();

    // THEN: A bare `devices`
    assert_eq!(command.tag, CommandTag::Devices);
    assert_eq!(command.argv, vec!["devices"]);
}
