use clap::Args;
use serde_json::json;

use crate::branding::contrast::{WCAG_AAA_NORMAL_TEXT, WCAG_AA_LARGE_TEXT, WCAG_AA_NORMAL_TEXT};
use crate::branding::{contrast_ratio, Color, ContrastPolicy};
use crate::cli::utils::{output_success, parse_color_arg};
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct ContrastArgs {
    #[arg(help = "Color as #rrggbb")]
    pub color: String,

    #[arg(long, default_value = "#ffffff", help = "Reference color")]
    pub against: String,
}

#[derive(Args)]
pub struct SelectArgs {
    #[arg(required = true, help = "Candidate colors in palette order")]
    pub colors: Vec<String>,

    #[arg(long, default_value = "#ffffff", help = "Reference color")]
    pub against: String,

    #[arg(long, default_value_t = WCAG_AA_LARGE_TEXT, help = "Minimum contrast ratio")]
    pub min: f64,
}

pub fn handle_contrast(args: ContrastArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let color = parse_color_arg(&args.color, "color")?;
    let reference = parse_color_arg(&args.against, "--against")?;
    let ratio = contrast_ratio(color, reference);

    let levels = json!({
        "aa_large_text": ratio >= WCAG_AA_LARGE_TEXT,
        "aa_normal_text": ratio >= WCAG_AA_NORMAL_TEXT,
        "aaa_normal_text": ratio >= WCAG_AAA_NORMAL_TEXT,
    });

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            &format!("{} vs {}", color, reference),
            Some(json!({ "color": color, "against": reference, "ratio": ratio, "passes": levels })),
        ),
        OutputFormat::Text => {
            println!("{} vs {}: {:.2}:1", color, reference, ratio);
            println!("  AA large text  ({:.1}): {}", WCAG_AA_LARGE_TEXT, pass(ratio >= WCAG_AA_LARGE_TEXT));
            println!("  AA normal text ({:.1}): {}", WCAG_AA_NORMAL_TEXT, pass(ratio >= WCAG_AA_NORMAL_TEXT));
            println!("  AAA normal text ({:.1}): {}", WCAG_AAA_NORMAL_TEXT, pass(ratio >= WCAG_AAA_NORMAL_TEXT));
            Ok(())
        }
    }
}

pub fn handle_select(args: SelectArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let reference = parse_color_arg(&args.against, "--against")?;
    let palette = args
        .colors
        .iter()
        .map(|c| parse_color_arg(c, "color"))
        .collect::<anyhow::Result<Vec<Color>>>()?;

    let policy = ContrastPolicy::new(reference, args.min);
    let scores = policy.score(&palette);
    let selected = policy.select(&palette);

    match output_format {
        OutputFormat::Json => {
            let scores: Vec<_> = scores
                .iter()
                .map(|s| json!({ "color": s.color, "ratio": s.ratio }))
                .collect();
            output_success(
                &output_format,
                match selected {
                    Some(_) => "Selected a qualifying color",
                    None => "No color meets the minimum contrast",
                },
                Some(json!({ "selected": selected.map(|s| s.color), "scores": scores })),
            )
        }
        OutputFormat::Text => {
            for score in &scores {
                let marker = match selected {
                    Some(best) if best.color == score.color => "*",
                    _ => " ",
                };
                println!("{} {} {:.2}:1", marker, score.color, score.ratio);
            }
            match selected {
                Some(best) => println!("Selected {}", best.color),
                None => println!("No color reaches {:.1}:1 against {}", args.min, reference),
            }
            Ok(())
        }
    }
}

fn pass(ok: bool) -> &'static str {
    if ok {
        "pass"
    } else {
        "fail"
    }
}
