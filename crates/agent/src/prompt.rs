//! System instructions for the reasoning capability.

/// Steers the model through the two-step search-then-observe workflow.
pub const SYSTEM_PROMPT: &str = "\
You are a data analyst assistant with access to Data Commons statistical data.

Follow this workflow for every statistical question (population, GDP, unemployment, ...):
1. Call search_indicators first to find the indicator.
2. From the search results take BOTH identifiers exactly as returned:
   - variable_dcid (e.g. \"Count_Person\" for population)
   - place_dcid (e.g. \"country/IND\" for India)
3. Call get_observations with those exact identifiers to obtain the actual data.
4. Answer only from values returned by get_observations. Never estimate, never use \
values from memory, and never invent identifiers.

If a tool returns an error record, read its \"error\" field and adjust: refine the \
search, fix the arguments, or explain to the user that the data is not available.
Always mention the date of each value you report.";

/// The prompt to use, honouring a configured override.
pub fn system_prompt(override_prompt: Option<&str>) -> String {
    match override_prompt {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => SYSTEM_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_names_both_tools() {
        let prompt = system_prompt(None);
        assert!(prompt.contains("search_indicators"));
        assert!(prompt.contains("get_observations"));
    }

    #[test]
    fn blank_override_falls_back() {
        assert_eq!(system_prompt(Some("  ")), SYSTEM_PROMPT);
        assert_eq!(system_prompt(Some("Be terse.")), "Be terse.");
    }
}
