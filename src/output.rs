use console::Style;

use crate::mutants::{MutantStatus, MutationPoint};
use crate::operators::MutationOperator;
use crate::report::{MutantRecord, MutationReport};

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{:.1}%", s * 100.0),
        None => "no valid mutants".to_string(),
    }
}

pub fn print_run_result(report: &MutationReport) {
    let c = &report.counts;
    let secs = report.duration_ms as f64 / 1000.0;
    let valid = c.valid(report.scoring_includes_timeouts);

    if report.score.is_none() {
        let style = Style::new().red().bold();
        println!(
            "{} {} mutants, {} in {:.1}s",
            style.apply_to("✗"),
            c.total(),
            format_score(None),
            secs,
        );
    } else if c.survived == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {} mutants, all killed ({}) in {:.1}s",
            style.apply_to("✓"),
            valid,
            format_score(report.score),
            secs,
        );
    } else {
        let style = Style::new().yellow().bold();
        println!(
            "{} {} survived / {} valid ({} killed) in {:.1}s",
            style.apply_to("!"),
            c.survived,
            valid,
            format_score(report.score),
            secs,
        );
    }

    let dim = Style::new().dim();
    for (count, what) in [
        (c.stillborn, "stillborn mutants (did not build)"),
        (c.timed_out, "mutants timed out"),
        (c.errored, "mutants errored"),
        (c.skipped, "mutants skipped"),
    ] {
        if count > 0 {
            println!("  {} {} {}", dim.apply_to("·"), count, what);
        }
    }
    for err in &report.scan_errors {
        println!("  {} {}", dim.apply_to("·"), err);
    }

    let weak: Vec<_> = report.weak_operators().collect();
    if !weak.is_empty() {
        let warn = Style::new().yellow();
        println!();
        for op in weak {
            println!(
                "  {} weak operator {}: {} of {} survived",
                warn.apply_to("!"),
                op.operator,
                op.counts.survived,
                op.counts.valid(report.scoring_includes_timeouts),
            );
        }
    }

    let survivors: Vec<_> = report.surviving().collect();
    if survivors.is_empty() {
        return;
    }
    println!();
    for m in survivors {
        print_survivor_line(m);
    }
}

fn print_survivor_line(m: &MutantRecord) {
    let ref_style = Style::new().cyan().bold();
    let loc_style = Style::new().dim();
    let op_style = Style::new().magenta();

    println!(
        "  {} {}:{} {} {} → {}",
        ref_style.apply_to(format!("@{}", m.ref_id)),
        m.file.display(),
        m.line,
        loc_style.apply_to(format!("[{}]", m.operator)),
        op_style.apply_to(&m.original),
        op_style.apply_to(&m.mutated),
    );
}

pub fn print_mutant_detail(m: &MutantRecord) {
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!(
        "{} {}:{}:{} [{}] {}",
        ref_style.apply_to(format!("@{}", m.ref_id)),
        m.file.display(),
        m.line,
        m.column,
        m.operator,
        m.status.label(),
    );
    println!();

    for line in &m.context_before {
        println!("  {}", dim.apply_to(line));
    }
    for line in m.diff.lines() {
        if line.starts_with('-') {
            println!("  {}", Style::new().red().apply_to(line));
        } else if line.starts_with('+') {
            println!("  {}", Style::new().green().apply_to(line));
        }
    }
    for line in &m.context_after {
        println!("  {}", dim.apply_to(line));
    }

    if m.status != MutantStatus::Survived {
        if let Some(detail) = &m.detail {
            println!();
            for line in detail.lines() {
                println!("  {}", dim.apply_to(line));
            }
        }
    }
}

pub fn print_status(report: &MutationReport) {
    let c = &report.counts;
    println!(
        "Last run: {} mutants, {} killed, {} survived ({} score)",
        c.total(),
        c.killed,
        c.survived,
        format_score(report.score),
    );

    if c.survived > 0 {
        println!();
        for m in report.surviving() {
            let ref_style = Style::new().cyan().bold();
            println!(
                "  {} {}:{} {} → {}",
                ref_style.apply_to(format!("@{}", m.ref_id)),
                m.file.display(),
                m.line,
                m.original,
                m.mutated,
            );
        }
        println!();
        println!("Use `darwinian show @m0` for details on a specific mutant.");
    }
}

pub fn print_operators(ops: &[MutationOperator]) {
    let id_style = Style::new().cyan();
    let dim = Style::new().dim();
    for op in ops {
        let default = if op.enabled_by_default { "default" } else { "opt-in" };
        println!(
            "{:<24} {:<11} {:<8} {}",
            id_style.apply_to(op.id),
            format!("{:?}", op.category).to_lowercase(),
            default,
            dim.apply_to(op.description),
        );
    }
}

pub fn print_points(points: &[MutationPoint]) {
    let loc_style = Style::new().dim();
    let op_style = Style::new().magenta();
    for p in points {
        println!(
            "{}:{}:{} {} {} → {}",
            p.file.display(),
            p.location.line,
            p.location.column,
            loc_style.apply_to(format!("[{}]", p.operator)),
            op_style.apply_to(&p.original),
            op_style.apply_to(&p.mutated),
        );
    }
    println!();
    println!("{} mutation points", points.len());
}
