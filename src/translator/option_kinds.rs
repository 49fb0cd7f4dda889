use logos::{Lexer, Logos};

/// Which MSVC C runtime library the produced binary links against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeLibrary {
    /// `/MD`
    MultiThreadedDll,
    /// `/MDd`
    MultiThreadedDebugDll,
}

impl RuntimeLibrary {
    /// Value of CMake's `MSVC_RUNTIME_LIBRARY` target property.
    pub fn as_cmake_name(self) -> &'static str {
        match self {
            RuntimeLibrary::MultiThreadedDll => "MultiThreadedDLL",
            RuntimeLibrary::MultiThreadedDebugDll => "MultiThreadedDebugDLL",
        }
    }
}

/// Drop the leading `-` or `/` plus `skip` option characters.
fn switch_argument<'input>(lex: &Lexer<'input, ClOption<'input>>, skip: usize) -> &'input str {
    &lex.slice()[1 + skip..]
}

fn lex_standard<'lexer, 'input: 'lexer>(
    lex: &'lexer mut Lexer<'input, ClOption<'input>>,
) -> Result<u32, std::num::ParseIntError> {
    switch_argument(lex, "std:c".len()).parse()
}

/// Every `cl` command line token we know how to translate. Each option can
/// be introduced by either `-` or `/`.
///
/// A token is only recognized when a single lexeme covers all of it, see
/// [`ClOption::classify`].
#[derive(Logos, Clone, Debug, PartialEq)]
#[logos(subpattern switch = r"[\-/]")]
pub enum ClOption<'input> {
    #[regex(r"(?&switch)D[^\n]*", |lex| switch_argument(lex, 1))]
    Define(&'input str),

    /// `/Fe:`, takes the output path as the following token
    #[regex(r"(?&switch)Fe:")]
    OutputFile,

    #[regex(r"(?&switch)fsanitize([^\n\w][^\n]*)?")]
    Sanitize,

    /// `/I`, takes the directory as the following token
    #[regex(r"(?&switch)I")]
    Include,

    #[regex(r"(?&switch)I[^\n]+", |lex| switch_argument(lex, 1))]
    IncludeAttached(&'input str),

    #[regex(r"(?&switch)link")]
    Link,

    #[regex(r"(?&switch)nologo")]
    NoLogo,

    #[regex(r"(?&switch)MD", |_| RuntimeLibrary::MultiThreadedDll)]
    #[regex(r"(?&switch)MDd", |_| RuntimeLibrary::MultiThreadedDebugDll)]
    Runtime(RuntimeLibrary),

    #[regex(r"(?&switch)std:c[0-9]+", lex_standard)]
    Standard(u32),

    #[regex(r"(?&switch)Wall")]
    WarnAll,

    /// Targeted warning enable/disable, e.g. `/wd4820`
    #[regex(r"(?&switch)w[de][0-9]+")]
    WarningToggle,

    #[regex(r"\w[^\n]*", |lex| lex.slice())]
    Source(&'input str),

    #[error]
    Error,
}

impl<'input> ClOption<'input> {
    /// Classify a whole command line token.
    ///
    /// Anything that lexes into more than one lexeme (e.g. `/Wallx`, which
    /// would otherwise be `/Wall` followed by a stray `x`) is an `Error`.
    pub fn classify(token: &'input str) -> Self {
        let mut lex = ClOption::lexer(token);
        match lex.next() {
            Some(option) if lex.span() == (0..token.len()) => option,
            _ => ClOption::Error,
        }
    }
}
