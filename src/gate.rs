use dialoguer::Input;

/// Answer that lets the run continue.
const YES: &str = "y";

/// Source of operator answers.
pub trait Prompter {
    fn ask(&mut self, question: &str) -> anyhow::Result<String>;
}

/// Reads answers from the terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> anyhow::Result<String> {
        let answer: String = Input::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort,
}

/// Pause point between phases so the operator can inspect the directories.
pub struct Checkpoint {
    prompter: Option<Box<dyn Prompter>>,
}

impl Checkpoint {
    pub fn interactive(prompter: Box<dyn Prompter>) -> Self {
        Self {
            prompter: Some(prompter),
        }
    }

    /// A gate that never asks and always continues.
    pub fn disabled() -> Self {
        Self { prompter: None }
    }

    /// `y` continues. Anything else asks once more whether the operator
    /// really wants to stop; only a second non-`y` aborts.
    pub fn confirm(&mut self, next_phase: &str) -> anyhow::Result<Decision> {
        let Some(prompter) = self.prompter.as_mut() else {
            return Ok(Decision::Continue);
        };

        let first = prompter.ask(&format!("Next: {}. Press y to continue", next_phase))?;
        if first.trim() == YES {
            return Ok(Decision::Continue);
        }

        let second = prompter.ask("You really don't want to continue? Press y to continue anyway")?;
        if second.trim() == YES {
            return Ok(Decision::Continue);
        }
        Ok(Decision::Abort)
    }
}
