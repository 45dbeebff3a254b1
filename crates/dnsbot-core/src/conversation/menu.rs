//! Prompts and keyboards

use crate::conversation::{Action, CancelTarget, DomainPurpose};
use crate::model::DnsRecordSnapshot;
use crate::pagination::PageLayout;
use crate::scheduler::DdnsTask;
use crate::traits::{Button, Keyboard, MessageOptions};

pub(crate) const SESSION_EXPIRED: &str = "Session expired, please start again";

pub(crate) const HELP: &str = "\
DNS bot commands:
/setdns - create or update a record
/getdns - look up and manage records for a name
/getdnsall - list every record in a zone
/deldns - delete all records for a name
/ddns - keep a record in sync with this host's public IP
/ddnsstatus - show running DDNS tasks
/stopddns - stop DDNS tasks
/domains - list configured domains
/help - show this message";

fn cancel_target(purpose: DomainPurpose) -> CancelTarget {
    match purpose {
        DomainPurpose::Set => CancelTarget::SetDns,
        DomainPurpose::Query | DomainPurpose::All => CancelTarget::GetDns,
        DomainPurpose::Delete => CancelTarget::DelDns,
        DomainPurpose::Ddns => CancelTarget::Ddns,
    }
}

fn cancel(target: CancelTarget) -> Button {
    Button::new("Cancel", Action::Cancel(target))
}

/// Turn what the user typed into a fully-qualified name under `root`
///
/// `.` or the root itself selects the root. Returns `None` for input that
/// cannot be a DNS label.
pub(crate) fn qualify_domain(input: &str, root: &str) -> Option<String> {
    let input = input.trim().to_ascii_lowercase();
    if input == "." || input == "@" {
        return Some(root.to_string());
    }

    let input = input.trim_end_matches('.');
    if input.is_empty()
        || input.starts_with('.')
        || input.contains("..")
        || !input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '*'))
    {
        return None;
    }
    if input == root || input.ends_with(&format!(".{}", root)) {
        return Some(input.to_string());
    }
    Some(format!("{}.{}", input, root))
}

pub(crate) fn format_interval(secs: u64) -> String {
    match secs {
        s if s % 3600 == 0 => format!("{} h", s / 3600),
        s if s % 60 == 0 => format!("{} min", s / 60),
        s => format!("{} s", s),
    }
}

pub(crate) fn domain_menu(purpose: DomainPurpose, domains: &[String]) -> (String, MessageOptions) {
    let title = match purpose {
        DomainPurpose::Set => "Select the domain for the record:",
        DomainPurpose::Query => "Select the domain to look up:",
        DomainPurpose::All => "Select the domain whose zone you want to list:",
        DomainPurpose::Delete => "Select the domain to delete records from:",
        DomainPurpose::Ddns => "Select the domain for DDNS:",
    };

    let keyboard = domains
        .iter()
        .fold(Keyboard::new(), |keyboard, domain| {
            keyboard.button(
                domain.clone(),
                Action::SelectDomain {
                    purpose,
                    domain: domain.clone(),
                },
            )
        })
        .row(vec![cancel(cancel_target(purpose))]);

    (title.to_string(), MessageOptions::with_keyboard(keyboard))
}

pub(crate) fn subdomain_prompt(purpose: DomainPurpose, root: &str) -> (String, MessageOptions) {
    let text = format!(
        "Enter the subdomain under {} (for example www), or \".\" for {} itself:",
        root, root
    );
    let keyboard = Keyboard::new()
        .button(format!("Use {}", root), Action::UseRootDomain(purpose))
        .row(vec![cancel(cancel_target(purpose))]);
    (text, MessageOptions::with_keyboard(keyboard))
}

pub(crate) fn ip_prompt(domain: &str) -> (String, MessageOptions) {
    (
        format!("Enter the IP address for {} (IPv4 or IPv6):", domain),
        MessageOptions::with_keyboard(Keyboard::new().row(vec![cancel(CancelTarget::SetDns)])),
    )
}

pub(crate) fn proxy_prompt(domain: &str, update: bool) -> (String, MessageOptions) {
    let (yes, no, cancel_button) = if update {
        (
            Action::UpdateProxy(true),
            Action::UpdateProxy(false),
            Button::new("Cancel", Action::CancelUpdateRecord),
        )
    } else {
        (
            Action::Proxy(true),
            Action::Proxy(false),
            cancel(CancelTarget::SetDns),
        )
    };

    let keyboard = Keyboard::new()
        .row(vec![Button::new("Proxied", yes), Button::new("DNS only", no)])
        .row(vec![cancel_button]);
    (
        format!("Route traffic for {} through the provider's proxy?", domain),
        MessageOptions::with_keyboard(keyboard),
    )
}

pub(crate) fn confirm_delete_all(domain: &str) -> (String, MessageOptions) {
    let keyboard = Keyboard::new().row(vec![
        Button::new("Delete", Action::ConfirmDelete),
        cancel(CancelTarget::Delete),
    ]);
    (
        format!("Delete every record named {}? This cannot be undone.", domain),
        MessageOptions::with_keyboard(keyboard),
    )
}

fn record_line(position: usize, record: &DnsRecordSnapshot) -> String {
    format!(
        "{}. {} {} {}{}",
        position,
        record.name,
        record.record_type,
        record.content,
        if record.proxied { " (proxied)" } else { "" }
    )
}

/// Text and keyboard for one rendered page of a record list
pub(crate) fn record_list(
    title: &str,
    records: &[DnsRecordSnapshot],
    layout: &PageLayout,
) -> (String, MessageOptions) {
    let mut text = format!(
        "{} ({} records, page {}/{}):\n",
        title,
        records.len(),
        layout.page + 1,
        layout.total_pages.max(1)
    );

    let mut keyboard = Keyboard::new();
    for (key, index) in &layout.entries {
        let Some(record) = records.get(*index) else {
            continue;
        };
        text.push('\n');
        text.push_str(&record_line(index + 1, record));
        keyboard = keyboard.button(
            format!("{}. {} ({})", index + 1, record.name, record.record_type),
            Action::SelectRecord(*key),
        );
    }

    let mut nav = Vec::new();
    if layout.page > 0 {
        nav.push(Button::new("« Prev", Action::PrevPage));
    }
    nav.push(Button::new(
        format!("{}/{}", layout.page + 1, layout.total_pages.max(1)),
        Action::PageInfo,
    ));
    if layout.page + 1 < layout.total_pages {
        nav.push(Button::new("Next »", Action::NextPage));
    }

    let keyboard = keyboard
        .row(nav)
        .row(vec![Button::new("Done", Action::Done)]);
    (text, MessageOptions::with_keyboard(keyboard))
}

pub(crate) fn record_detail(record: &DnsRecordSnapshot) -> (String, MessageOptions) {
    let text = format!(
        "Name: {}\nType: {}\nContent: {}\nProxied: {}",
        record.name,
        record.record_type,
        record.content,
        if record.proxied { "yes" } else { "no" }
    );

    let mut actions = Vec::new();
    if record.record_type.is_address() {
        actions.push(Button::new("Update IP", Action::UpdateRecord));
    }
    actions.push(Button::new("Delete", Action::DeleteRecord));

    let keyboard = Keyboard::new()
        .row(actions)
        .button("Back to list", Action::BackToList);
    (text, MessageOptions::with_keyboard(keyboard))
}

pub(crate) fn confirm_delete_record(record: &DnsRecordSnapshot) -> (String, MessageOptions) {
    let keyboard = Keyboard::new().row(vec![
        Button::new("Delete", Action::ConfirmDeleteRecord),
        Button::new("Keep", Action::CancelDeleteRecord),
    ]);
    (
        format!("Delete this record?\n\n{}", record_line(1, record)),
        MessageOptions::with_keyboard(keyboard),
    )
}

pub(crate) fn new_ip_prompt(record: &DnsRecordSnapshot) -> (String, MessageOptions) {
    let family = record
        .record_type
        .family()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "IP".to_string());
    let keyboard = Keyboard::new().row(vec![
        Button::new("Back to list", Action::BackToList),
        Button::new("Cancel", Action::CancelUpdateRecord),
    ]);
    (
        format!(
            "Current content of {} ({}): {}\nEnter the new {} address:",
            record.name, record.record_type, record.content, family
        ),
        MessageOptions::with_keyboard(keyboard),
    )
}

pub(crate) fn interval_prompt(
    domain: &str,
    presets: &[u64],
    min_secs: u64,
    max_secs: u64,
) -> (String, MessageOptions) {
    let presets: Vec<Button> = presets
        .iter()
        .map(|secs| Button::new(format_interval(*secs), Action::DdnsInterval(*secs)))
        .collect();
    let keyboard = Keyboard::new()
        .row(presets)
        .row(vec![cancel(CancelTarget::Ddns)]);
    (
        format!(
            "How often should {} be checked? Pick a preset or enter seconds ({}-{}):",
            domain, min_secs, max_secs
        ),
        MessageOptions::with_keyboard(keyboard),
    )
}

pub(crate) fn ddns_status(tasks: &[DdnsTask]) -> String {
    if tasks.is_empty() {
        return "No DDNS tasks are running.".to_string();
    }

    let mut text = format!("{} DDNS task(s):\n", tasks.len());
    for task in tasks {
        let last_ip = task
            .last_applied_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "none yet".to_string());
        let last_checked = task
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        text.push_str(&format!(
            "\n{} ({}) every {}\n  zone: {}\n  last IP: {}\n  last check: {}\n",
            task.domain,
            task.record_type,
            format_interval(task.interval_secs),
            task.zone_id,
            last_ip,
            last_checked
        ));
    }
    text
}

pub(crate) fn stop_menu(tasks: &[DdnsTask]) -> (String, MessageOptions) {
    let keyboard = tasks
        .iter()
        .fold(Keyboard::new(), |keyboard, task| {
            keyboard.button(
                format!("Stop {}", task.domain),
                Action::StopDdns(task.domain.clone()),
            )
        })
        .row(vec![
            Button::new("Stop all", Action::StopAllDdns),
            Button::new("Cancel", Action::CancelStopDdns),
        ]);
    (
        "Which DDNS task should be stopped?".to_string(),
        MessageOptions::with_keyboard(keyboard),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordType;
    use crate::pagination::PageCursor;

    #[test]
    fn qualifies_subdomains() {
        assert_eq!(qualify_domain("www", "example.com").as_deref(), Some("www.example.com"));
        assert_eq!(qualify_domain(" WWW ", "example.com").as_deref(), Some("www.example.com"));
        assert_eq!(qualify_domain(".", "example.com").as_deref(), Some("example.com"));
        assert_eq!(
            qualify_domain("a.b.example.com", "example.com").as_deref(),
            Some("a.b.example.com")
        );
        assert_eq!(qualify_domain("bad name", "example.com"), None);
        assert_eq!(qualify_domain("a..b", "example.com"), None);
        assert_eq!(qualify_domain("  ", "example.com"), None);
    }

    #[test]
    fn interval_labels() {
        assert_eq!(format_interval(60), "1 min");
        assert_eq!(format_interval(3600), "1 h");
        assert_eq!(format_interval(90), "90 s");
    }

    #[test]
    fn record_list_hides_unavailable_navigation() {
        let records: Vec<DnsRecordSnapshot> = (0..3)
            .map(|i| DnsRecordSnapshot {
                id: format!("r{i}"),
                zone_id: "z".into(),
                name: "example.com".into(),
                record_type: RecordType::A,
                content: format!("10.0.0.{i}"),
                proxied: false,
            })
            .collect();
        let layout = PageCursor::new(3, 5).layout(3);

        let (text, options) = record_list("Records", &records, &layout);
        let keyboard = options.keyboard.unwrap();
        let actions: Vec<&Action> = keyboard.actions().collect();

        assert!(text.contains("page 1/1"));
        assert!(!actions.contains(&&Action::PrevPage));
        assert!(!actions.contains(&&Action::NextPage));
        assert!(actions.contains(&&Action::Done));
    }
}
