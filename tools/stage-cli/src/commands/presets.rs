//! List aspect-ratio presets.

use stage_design_model::ASPECT_RATIOS;

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ASPECT_RATIOS)?);
        return Ok(());
    }

    println!("Aspect ratio presets:");
    for preset in ASPECT_RATIOS {
        println!(
            "  {:<8} {:<13} {:>4}x{:<4} ({})",
            preset.id,
            preset.name,
            preset.width,
            preset.height,
            preset.css_ratio()
        );
    }
    Ok(())
}
