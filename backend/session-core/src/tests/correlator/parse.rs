use crate::correlator::package::{CatalogResolver, NameOnlyResolver};
use crate::correlator::parse::{
    app_processes, package_names, parse_devices, parse_packages, parse_processes,
};

use models::{AppDescriptor, ProcessEntry};

fn descriptor(package: &str, display_name: &str, system: bool) -> AppDescriptor {
    AppDescriptor {
        package: package.to_string(),
        display_name: display_name.to_string(),
        icon: None,
        system,
    }
}

fn process(name: &str, pid: u32) -> ProcessEntry {
    ProcessEntry {
        name: name.to_string(),
        pid: Some(pid),
        row: format!("{name} {pid}"),
    }
}

// ----------------------------------------------------------------------------
// devices
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the device rule keeps only devices in the `device` state.
///
/// **WHY THIS MATTERS**: Offline and unauthorized devices cannot run commands. Selecting one
/// would make every follow-up command fail silently.
///
/// **BUG THIS CATCHES**: Would catch a substring match on "device" that lets the header line
/// ("List of devices attached") or an offline row through.
#[test]
fn given_device_listing_when_parsing_devices_then_returns_only_online_serials() {
    // GIVEN: A listing with one online and one offline device
    let text = "List of devices attached\nABCD1234\tdevice\nEFGH5678\toffline\n";

    // WHEN: Parsing it
    let devices = parse_devices(text);

    // THEN: Only the online serial remains
    assert_eq!(devices, vec![String::from("ABCD1234")]);
}

#[test]
fn given_echo_line_before_listing_when_parsing_devices_then_header_is_not_a_device() {
    // GIVEN: Client output preceded by the command echo line
    let text = "$ adb devices\nList of devices attached\nR58M\tdevice\n10.0.0.7:5555\tdevice\n\n";

    // WHEN: Parsing it
    let devices = parse_devices(text);

    // THEN: Both online devices, in listing order
    assert_eq!(devices, vec!["R58M", "10.0.0.7:5555"]);
}

// ----------------------------------------------------------------------------
// ps
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the process rule drops the header, pipeline noise, and short rows.
///
/// **WHY THIS MATTERS**: The process listing is piped through `grep` on the device, and the
/// pipeline itself can show up in the output. Those rows are not apps and must not be joined.
///
/// **BUG THIS CATCHES**: Would catch dropping the noise filter or keeping single-field rows.
#[test]
fn given_process_output_with_noise_when_parsing_processes_then_keeps_well_formed_rows() {
    // GIVEN: A header, a grep noise line, a blank line, a one-field row, and two real rows
    let text = "NAME PID\n\
                grep com 8812\n\
                \n\
                orphan\n\
                com.example.app   4242\n\
                com.android.chrome 1001\n";

    // WHEN: Parsing it
    let processes = parse_processes(text);

    // THEN: Only the two real rows survive, whitespace normalized
    assert_eq!(
        processes,
        vec![
            ProcessEntry {
                name: String::from("com.example.app"),
                pid: Some(4242),
                row: String::from("com.example.app 4242"),
            },
            ProcessEntry {
                name: String::from("com.android.chrome"),
                pid: Some(1001),
                row: String::from("com.android.chrome 1001"),
            },
        ]
    );
}

#[test]
fn given_non_numeric_last_field_when_parsing_processes_then_pid_is_none() {
    // GIVEN: A row whose last column is not a PID
    let text = "header\ncom.example.app running\n";

    // WHEN: Parsing it
    let processes = parse_processes(text);

    // THEN: The row is kept without a PID
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].pid, None);
}

// ----------------------------------------------------------------------------
// pm
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies package lines lose their prefix and suppressed packages are dropped.
///
/// **WHY THIS MATTERS**: Vendor services show up as packages on some devices and cannot be
/// force-stopped. Listing them invites kills that do nothing.
///
/// **BUG THIS CATCHES**: Would catch matching suppression before stripping `package:`, which
/// lets every suppressed entry through.
#[test]
fn given_package_listing_when_extracting_names_then_strips_prefix_and_suppresses() {
    // GIVEN: An echo line, two packages, and one suppressed package
    let text = "$ adb -s R58M shell pm list packages -3\n\
                package:com.example.app\n\
                package:com.qti.phone\n\
                package:org.mozilla.firefox\n";
    let suppressed = vec![String::from("com.qti.phone")];

    // WHEN: Extracting package names
    let names = package_names(text, &suppressed);

    // THEN: The suppressed package is gone and prefixes are stripped
    assert_eq!(names, vec!["com.example.app", "org.mozilla.firefox"]);
}

/// **VALUE**: Verifies a package that fails resolution drops only its own line.
///
/// **WHY THIS MATTERS**: Metadata lookup can fail for packages uninstalled mid-listing. One
/// failure must not empty the whole application list.
///
/// **BUG THIS CATCHES**: Would catch short-circuiting the parse on the first resolution error.
#[tokio::test]
async fn given_unresolvable_package_when_parsing_packages_then_other_packages_survive() {
    // GIVEN: A catalog that knows only one of two listed packages
    let resolver = CatalogResolver::new().with_entry(descriptor("com.example.app", "Example", false));
    let text = "header\npackage:com.example.app\npackage:com.gone.app\n";

    // WHEN: Parsing the listing
    let packages = parse_packages(text, &[], &resolver).await;

    // THEN: The known package is resolved, the unknown one dropped
    assert_eq!(packages, vec![descriptor("com.example.app", "Example", false)]);
}

// ----------------------------------------------------------------------------
// app_processes
// ----------------------------------------------------------------------------

/// **VALUE**: Verifies the process/application join filters by name and hides system apps.
///
/// **WHY THIS MATTERS**: This is the list users kill apps from. Showing system apps or ignoring
/// the filter puts the wrong process one tap away from a force-stop.
///
/// **BUG THIS CATCHES**: Would catch matching the filter only on package id (display names
/// ignored), or the system flag being ignored when `hide_system` is set.
#[tokio::test]
async fn given_processes_and_packages_when_joining_then_filters_and_hides_system() {
    // GIVEN: Three processes, two known packages, one resolvable only through the resolver
    let processes = vec![
        process("com.example.app", 10),
        process("package:com.android.systemui", 20),
        process("org.mozilla.firefox", 30),
    ];
    let packages = vec![
        descriptor("com.example.app", "Example", false),
        descriptor("com.android.systemui", "System UI", true),
    ];
    let resolver = NameOnlyResolver;

    // WHEN: Joining with system apps hidden and no filter
    let rows = app_processes(&processes, &packages, &[], &resolver, "", true).await;

    // THEN: The system app is gone, the unknown process resolved by name
    let names: Vec<&str> = rows.iter().map(|r| r.descriptor.package.as_str()).collect();
    assert_eq!(names, vec!["com.example.app", "org.mozilla.firefox"]);
    assert_eq!(rows[1].pid, Some(30));

    // WHEN: Filtering by display name with system apps shown
    let rows = app_processes(&processes, &packages, &[], &resolver, "System", false).await;

    // THEN: Only the display-name match is left
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].descriptor.display_name, "System UI");
    assert_eq!(rows[0].pid, Some(20));
}
