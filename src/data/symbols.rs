//! Unicode Greek letter tables
//!
//! One table serves both the bibliography sanitizer and the grammar
//! normalizer. Uppercase Greek letters that are visually identical to Latin
//! capitals have no LaTeX command of their own and map to the bare Latin
//! letter instead of a math-mode command; the same applies to lowercase
//! omicron.

use phf::{phf_map, phf_set};

/// Greek letters with a dedicated LaTeX math-mode command.
pub static GREEK_COMMANDS: phf::Map<char, &'static str> = phf_map! {
    'α' => "\\alpha",
    'β' => "\\beta",
    'γ' => "\\gamma",
    'δ' => "\\delta",
    'ε' => "\\epsilon",
    'ζ' => "\\zeta",
    'η' => "\\eta",
    'θ' => "\\theta",
    'ι' => "\\iota",
    'κ' => "\\kappa",
    'λ' => "\\lambda",
    'μ' => "\\mu",
    'ν' => "\\nu",
    'ξ' => "\\xi",
    'π' => "\\pi",
    'ρ' => "\\rho",
    'ς' => "\\varsigma",
    'σ' => "\\sigma",
    'τ' => "\\tau",
    'υ' => "\\upsilon",
    'φ' => "\\phi",
    'χ' => "\\chi",
    'ψ' => "\\psi",
    'ω' => "\\omega",
    'Γ' => "\\Gamma",
    'Δ' => "\\Delta",
    'Θ' => "\\Theta",
    'Λ' => "\\Lambda",
    'Ξ' => "\\Xi",
    'Π' => "\\Pi",
    'Σ' => "\\Sigma",
    'Φ' => "\\Phi",
    'Ψ' => "\\Psi",
    'Ω' => "\\Omega",
};

/// Greek letters that are indistinguishable from Latin letters in print.
pub static GREEK_LATIN_LOOKALIKES: phf::Map<char, char> = phf_map! {
    'Α' => 'A',
    'Β' => 'B',
    'Ε' => 'E',
    'Ζ' => 'Z',
    'Η' => 'H',
    'Ι' => 'I',
    'Κ' => 'K',
    'Μ' => 'M',
    'Ν' => 'N',
    'Ο' => 'O',
    'Ρ' => 'P',
    'Τ' => 'T',
    'Υ' => 'Y',
    'Χ' => 'X',
    'ο' => 'o',
};

/// Command names recognized by the bare `\alpha`-style math-wrapping rule.
pub static GREEK_COMMAND_NAMES: phf::Set<&'static str> = phf_set! {
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta",
    "iota", "kappa", "lambda", "mu", "nu", "xi", "pi", "rho", "varsigma",
    "sigma", "tau", "upsilon", "phi", "chi", "psi", "omega",
    "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Phi", "Psi",
    "Omega",
};

/// True if the string contains any character the Greek tables cover.
pub fn contains_greek(input: &str) -> bool {
    input
        .chars()
        .any(|c| GREEK_COMMANDS.contains_key(&c) || GREEK_LATIN_LOOKALIKES.contains_key(&c))
}

/// Replace every Unicode Greek letter with its text-mode rendering: a
/// `$\alpha$`-style inline math command, or the bare Latin letter for
/// Latin-lookalike capitals.
pub fn greek_to_math(input: &str) -> String {
    if !contains_greek(input) {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        if let Some(latin) = GREEK_LATIN_LOOKALIKES.get(&c) {
            out.push(*latin);
        } else if let Some(cmd) = GREEK_COMMANDS.get(&c) {
            out.push('$');
            out.push_str(cmd);
            out.push('$');
        } else {
            out.push(c);
        }
    }
    out
}
