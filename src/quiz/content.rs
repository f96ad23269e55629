//! Reference questionnaire content
//!
//! The staffing growth assessment shipped with the site. It is ordinary
//! [`Questionnaire`] data and can be replaced wholesale by content loaded
//! with [`Questionnaire::from_json`].

use super::config::{AnswerOption, Question, Questionnaire};

fn question(id: &str, prompt: &str, labels: [&str; 4]) -> Question {
    Question::new(
        id,
        prompt,
        labels
            .into_iter()
            .zip(1..)
            .map(|(label, value)| AnswerOption::new(label, value))
            .collect(),
    )
}

impl Questionnaire {
    /// The eight-question staffing growth assessment
    pub fn staffing_growth() -> Self {
        Self::new(
            "What's your Staffing Growth Score?",
            vec![
                question(
                    "pipeline",
                    "How would you describe your client pipeline right now?",
                    [
                        "Mostly referrals, we have no proactive outbound",
                        "Some outbound, but it's inconsistent",
                        "Outbound is running, but conversion is low",
                        "Pipeline is healthy and predictable",
                    ],
                ),
                question(
                    "data",
                    "How useful is your ATS/CRM data for making decisions?",
                    [
                        "It's a mess, we barely trust it",
                        "It has some value, but takes hours to pull reports",
                        "We have basic dashboards, but they're not great",
                        "Our data is clean and drives weekly decisions",
                    ],
                ),
                question(
                    "automation",
                    "How automated are your internal workflows?",
                    [
                        "Almost everything is manual",
                        "A few things are automated, but most is manual",
                        "We have some automations, but they're fragmented",
                        "Most repeatable processes are automated",
                    ],
                ),
                question(
                    "kpis",
                    "Do you have clear KPIs that your team tracks weekly?",
                    [
                        "No, we mostly go by gut feel",
                        "We track revenue, but not leading indicators",
                        "We have KPIs, but people don't use them consistently",
                        "KPIs are embedded in our weekly rhythm",
                    ],
                ),
                question(
                    "tech",
                    "How well do your tools (ATS, CRM, email, etc.) work together?",
                    [
                        "They don't, lots of copy-pasting and manual work",
                        "Some integrations, but many gaps",
                        "Mostly connected, with a few manual bridges",
                        "Fully integrated, data flows seamlessly",
                    ],
                ),
                question(
                    "ai",
                    "Where are you with AI adoption?",
                    [
                        "Haven't started, AI feels overwhelming",
                        "Experimenting with ChatGPT, but nothing systematic",
                        "Using AI in a few areas, want to expand",
                        "AI is integrated into our daily operations",
                    ],
                ),
                question(
                    "marketing",
                    "How consistent is your marketing and content?",
                    [
                        "We have no marketing presence to speak of",
                        "Sporadic LinkedIn posts, no strategy",
                        "Some content, but it doesn't generate leads",
                        "Consistent content that drives inbound interest",
                    ],
                ),
                question(
                    "playbooks",
                    "How well-documented are your sales and recruiting processes?",
                    [
                        "Nothing is documented, tribal knowledge only",
                        "Some notes exist, but they're outdated",
                        "We have basic SOPs, but adoption is spotty",
                        "Comprehensive playbooks that new hires follow",
                    ],
                ),
            ],
        )
    }
}

impl Default for Questionnaire {
    fn default() -> Self {
        Self::staffing_growth()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use garde::Validate;
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_staffing_growth_is_valid() {
        let questionnaire = Questionnaire::staffing_growth();
        assert!(questionnaire.validate().is_ok());
        assert_eq!(questionnaire.len(), 8);
        assert_eq!(questionnaire.max_score(), 32);
    }

    #[test]
    fn test_staffing_growth_ids_in_order() {
        let ids = Questionnaire::default()
            .questions
            .iter()
            .map(|q| q.id.to_string())
            .collect_vec();
        assert_eq!(
            ids,
            [
                "pipeline",
                "data",
                "automation",
                "kpis",
                "tech",
                "ai",
                "marketing",
                "playbooks"
            ]
        );
    }

    #[test]
    fn test_option_values_are_ranked() {
        for question in &Questionnaire::staffing_growth().questions {
            let values = question.options.iter().map(|o| o.value).collect_vec();
            assert_eq!(values, [1, 2, 3, 4]);
        }
    }
}
