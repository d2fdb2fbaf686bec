pub const CONTACT_SHEET_TEMPLATE: &str = "CINEMATIC CONTACT SHEET — PROMPT BASE (FINAL)
Analyze the entire scene and identify all main subjects and their spatial interaction.
Generate a 3x3 Cinematic Contact Sheet with 9 distinct shots, all taking place in the same environment, forming a clear visual narrative.
Each image must contain a small, subtle number overlay (1–9) in a corner. No titles, no text labels, no black borders, no dividers. Each frame must be a full cinematic image, edge-to-edge.

SHOT ORDER (MANDATORY SEQUENCE)
1. Extreme Long Shot (ELS) Subject(s) small within a vast environment.
2. Long Shot (LS) Full body of all main subjects visible.
3. Medium Long Shot (MLS / 3-4) Knees up, tension building.
4. Medium Shot (MS) Waist up, active interaction.
5. Medium Close-Up (MCU) Chest up, emotional intensity.
6. Close-Up (CU) Face or main focal point.
7. Extreme Close-Up (ECU) Macro detail (eyes, hands, claws, texture, impact).
8. Low Angle Shot Heroic, powerful perspective.
9. High Angle Shot Scale, aftermath, narrative closure.

CONSISTENCY RULES (VERY IMPORTANT)
• Same characters across all 9 images
• Same faces, bodies, outfits, materials
• Same environment and atmosphere
• Same lighting direction and color grading
• Same cinematic realism and proportions
Once a character is defined, its appearance must never change.

VISUAL STYLE
• Ultra-realistic
• Photorealism
• Cinematic film look
• Realistic depth of field (bokeh in close shots)
• Natural motion blur and textures
• NO cartoon
• NO illustration
• NO stylized or comic look";

pub const SUBJECT_HEADER: &str = "SCENE DESCRIPTION / SUBJECT:";

pub const VISION_SYSTEM_PROMPT: &str = "Analyze this image and describe the scene in detail in {language}. Focus on atmosphere, lighting, visual style, characters and action. IMPORTANT: BE DIRECT AND RAW. Do NOT start with phrases like 'The image shows', 'The scene presents' or 'Here we see'. Start describing the visual elements immediately (e.g. 'Lone man walking under acid rain...').";

pub const ENHANCE_PROMPT: &str = r#"Act as a director of photography and screenwriter. Improve the texts below so they become cinematic, detailed and visually rich (Midjourney style).

CURRENT INPUT:
Scene: "{scene}"
Action: "{action}"

INSTRUCTION:
Return ONLY a valid JSON object with two keys: "scene" and "action".
"scene": The improved description of the environment, lighting and atmosphere.
"action": The improved description of the action taking place.
The text must be written in {language}."#;

pub const BRAINSTORM_PROMPT: &str = r#"Generate a random, creative cinematic idea (Sci-Fi, Cyberpunk, Fantasy or Thriller).
Return ONLY a valid JSON object with two keys: "scene" and "action".
"scene": Detailed visual description of the environment and character.
"action": What is happening in the scene.
The text must be written in {language}."#;

pub const TRANSLATION_PROMPT: &str = "Translate the following scene and action description to {language} strictly. Output ONLY the translation combined in a narrative format, no introductory text. If it is already in {language}, just return it as is.\n\nDescription:\n{description}";

pub fn vision_instruction(language: &str) -> String {
    VISION_SYSTEM_PROMPT.replace("{language}", language)
}

pub fn enhance_prompt(scene: &str, action: &str, language: &str) -> String {
    ENHANCE_PROMPT
        .replace("{language}", language)
        .replace("{scene}", scene)
        .replace("{action}", action)
}

pub fn brainstorm_prompt(language: &str) -> String {
    BRAINSTORM_PROMPT.replace("{language}", language)
}

pub fn translation_prompt(description: &str, language: &str) -> String {
    TRANSLATION_PROMPT
        .replace("{language}", language)
        .replace("{description}", description)
}

pub fn combined_description(scene: &str, action: &str) -> String {
    format!("SCENE: {}\nACTION: {}", scene.trim(), action.trim())
}

pub fn compose_final_prompt(subject: &str) -> String {
    format!("{SUBJECT_HEADER}\n{subject}\n\n{CONTACT_SHEET_TEMPLATE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_prompt_puts_subject_before_template() {
        let output = compose_final_prompt("a rainy alley");
        assert!(output.starts_with(
            "SCENE DESCRIPTION / SUBJECT:\na rainy alley\n\nCINEMATIC CONTACT SHEET — PROMPT BASE (FINAL)"
        ));
        assert!(output.ends_with("• NO stylized or comic look"));
    }

    #[test]
    fn combined_description_trims_both_fields() {
        assert_eq!(
            combined_description("  neon street ", "\ndrone dives\n"),
            "SCENE: neon street\nACTION: drone dives"
        );
        assert_eq!(combined_description("alley", ""), "SCENE: alley\nACTION: ");
    }

    #[test]
    fn enhance_prompt_substitutes_language_before_user_text() {
        let prompt = enhance_prompt("{language} sign", "runs", "Portuguese");
        assert!(prompt.contains("Scene: \"{language} sign\""));
        assert!(prompt.contains("written in Portuguese."));
    }

    #[test]
    fn translation_prompt_mentions_target_twice() {
        let prompt = translation_prompt("SCENE: chuva\nACTION: ", "English");
        assert!(prompt.starts_with("Translate the following scene and action description to English strictly."));
        assert!(prompt.contains("If it is already in English, just return it as is."));
        assert!(prompt.ends_with("Description:\nSCENE: chuva\nACTION: "));
    }
}
