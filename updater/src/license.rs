//! First-run license acceptance.
//!
//! The vendor requires the operator to accept the license bundled in every
//! archive. Acceptance is remembered through the server's own marker file, so
//! the prompt appears only on the first install unless `--accept-license` is
//! given up front.

use crate::error::{Result, UpdaterError};
use log::info;
use std::io::{BufRead, Write};

/// Question shown after the license text.
pub const LICENSE_PROMPT: &str = "Accept license agreement (y/N)? ";

/// How the license gate was passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseDecision {
    /// The acceptance marker was already present.
    PreviouslyAccepted,
    /// `--accept-license` was given.
    AcceptedByFlag,
    /// The operator answered yes at the prompt.
    AcceptedAtPrompt,
}

/// Whether an answer counts as acceptance.
///
/// Anything beginning with `y` or `Y` is a yes; leading whitespace is
/// ignored.
///
/// # Examples
///
/// ```
/// use ts3_updater::license::is_affirmative;
///
/// assert!(is_affirmative("Yes please\n"));
/// assert!(!is_affirmative("no"));
/// assert!(!is_affirmative(""));
/// ```
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim_start().starts_with(['y', 'Y'])
}

/// Show `license_text` and ask the operator to accept it.
///
/// Returns `false` on any answer that is not a yes, including end of input.
///
/// # Errors
///
/// Returns an I/O error if the output cannot be written or input cannot be
/// read.
pub fn prompt_for_license(
    license_text: &str,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<bool> {
    writeln!(output, "{}", license_text.trim_end())?;
    writeln!(output)?;
    write!(output, "{LICENSE_PROMPT}")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

/// Pass the license gate or fail with [`UpdaterError::LicenseDeclined`].
///
/// `license_text` is only called when a prompt is actually needed, so the
/// archive is not read for operators who accepted earlier.
///
/// # Errors
///
/// Returns [`UpdaterError::LicenseDeclined`] when the operator does not
/// accept, or any error from `license_text` or the terminal.
pub fn ensure_license_accepted(
    previously_accepted: bool,
    accept_flag: bool,
    license_text: impl FnOnce() -> Result<String>,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<LicenseDecision> {
    if previously_accepted {
        return Ok(LicenseDecision::PreviouslyAccepted);
    }
    if accept_flag {
        info!("license accepted via --accept-license");
        return Ok(LicenseDecision::AcceptedByFlag);
    }

    let text = license_text()?;
    if prompt_for_license(&text, input, output)? {
        Ok(LicenseDecision::AcceptedAtPrompt)
    } else {
        Err(UpdaterError::LicenseDeclined)
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests fail fast on broken fixtures")]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use std::io::Cursor;

    fn gate(
        previously_accepted: bool,
        accept_flag: bool,
        answer: &str,
    ) -> (Result<LicenseDecision>, String) {
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = ensure_license_accepted(
            previously_accepted,
            accept_flag,
            || Ok("TeamSpeak license text".to_owned()),
            &mut input,
            &mut output,
        );
        (
            result,
            String::from_utf8(output).expect("output is UTF-8"),
        )
    }

    #[rstest]
    #[case::lower("y\n")]
    #[case::upper("Y\n")]
    #[case::word("yes\n")]
    #[case::padded("  Yep\n")]
    fn yes_answers_accept(#[case] answer: &str) {
        let (result, output) = gate(false, false, answer);
        assert_eq!(
            result.expect("accepted"),
            LicenseDecision::AcceptedAtPrompt
        );
        assert!(output.contains("TeamSpeak license text"));
        assert!(output.ends_with(LICENSE_PROMPT));
    }

    #[rstest]
    #[case::no("n\n")]
    #[case::empty("\n")]
    #[case::eof("")]
    #[case::other("okay\n")]
    fn other_answers_decline(#[case] answer: &str) {
        let (result, _) = gate(false, false, answer);
        let err = result.expect_err("declined");
        assert_eq!(err.kind(), ErrorKind::LicenseDeclined);
    }

    #[rstest]
    #[case::marker(true, false, LicenseDecision::PreviouslyAccepted)]
    #[case::flag(false, true, LicenseDecision::AcceptedByFlag)]
    #[case::both(true, true, LicenseDecision::PreviouslyAccepted)]
    fn skipping_the_prompt_reads_nothing(
        #[case] previously_accepted: bool,
        #[case] accept_flag: bool,
        #[case] expected: LicenseDecision,
    ) {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let decision = ensure_license_accepted(
            previously_accepted,
            accept_flag,
            || panic!("license text must not be read"),
            &mut input,
            &mut output,
        )
        .expect("gate passes");
        assert_eq!(decision, expected);
        assert!(output.is_empty());
    }
}
