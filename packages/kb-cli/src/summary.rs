//! Human-readable run and build summaries on stdout.

use colored::Colorize;

use kb_pipeline::{DomainReport, PublishedOutputs, RunCounters, RunReport, RunStatus, ValidationError};

fn counters_line(c: &RunCounters) -> String {
    format!(
        "pages {} seen / {} kept / {} unchanged / {} excluded / {} skipped, docs {}, steps {}, fees {}, faqs {}, claims +{}, errors {}",
        c.pages_seen,
        c.pages_kept,
        c.pages_unchanged,
        c.pages_excluded,
        c.pages_skipped,
        c.docs_found,
        c.steps,
        c.fees,
        c.faqs,
        c.claims_added,
        c.errors
    )
}

pub fn print_domain(domain: &DomainReport) {
    let marker = if domain.failed() {
        "✗".red().bold()
    } else {
        "✓".green().bold()
    };
    println!(
        "{} {} ({})",
        marker,
        domain.domain.bold(),
        domain.service_id.dimmed()
    );
    println!("    {}", counters_line(&domain.counters));
    if let Some(reason) = domain.failure_reason {
        println!(
            "    {} {}: {}",
            "failed".red(),
            reason.as_str(),
            domain.failure_message.as_deref().unwrap_or("")
        );
    }
    for error in domain.errors.iter().take(5) {
        println!("    {} {} {}", "!".yellow(), error.url, error.message.dimmed());
    }
    if domain.errors.len() > 5 {
        println!("    {} more error(s) in the run report", domain.errors.len() - 5);
    }
}

pub fn print_run(report: &RunReport) {
    println!();
    println!("{}", "Crawl summary".bright_cyan().bold());
    for domain in &report.domains {
        print_domain(domain);
    }
    println!();
    println!("  {}", counters_line(&report.totals));

    if !report.domains_failed_reasons.is_empty() {
        let reasons: Vec<String> = report
            .domains_failed_reasons
            .iter()
            .map(|(reason, count)| format!("{}={}", reason.as_str(), count))
            .collect();
        println!("  {} {}", "domains failed:".red(), reasons.join(", "));
    }

    match report.status {
        RunStatus::Completed if report.dry_run => {
            println!("{}", "Dry run complete, nothing written".yellow().bold())
        }
        RunStatus::Completed => println!("{}", "Run complete".green().bold()),
        RunStatus::Failed => println!(
            "{} {}",
            "Run failed:".red().bold(),
            report.failure_message.as_deref().unwrap_or("unknown error")
        ),
        RunStatus::Running => {}
    }
}

pub fn print_outputs(outputs: &PublishedOutputs) {
    let guides = &outputs.guides.guides;
    let steps: usize = guides.iter().map(|g| g.steps.len()).sum();
    let fees: usize = guides.iter().map(|g| g.fees.len()).sum();
    println!(
        "{} {} guide(s), {} step(s), {} fee(s), {} keyword(s), data_version {}",
        "Built".green().bold(),
        guides.len(),
        steps,
        fees,
        outputs.index.keywords.len(),
        outputs.guides.data_version
    );
}

pub fn print_validation(error: &ValidationError) {
    println!("{} {}", "Validation failed:".red().bold(), error);
    for issue in &error.issues {
        println!("  {} {}", "-".red(), issue);
    }
}
