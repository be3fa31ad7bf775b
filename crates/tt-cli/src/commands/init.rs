//! Init command for printing shell integration code.
//!
//! The hooks time every interactive command and hand it to
//! `timetrace record`, which applies ignore rules and the active session.
//! Project and tag come from `TIMETRACE_PROJECT` / `TIMETRACE_TAG`.

use std::io::Write;

use anyhow::Result;

use crate::cli::Shell;

/// Requires bash 5.0+ for `$EPOCHREALTIME`.
const BASH: &str = r#"# timetrace shell integration for bash
# Add to ~/.bashrc:
#   eval "$(timetrace init bash)"

__timetrace_at_prompt=0

__timetrace_preexec() {
    [ -n "${COMP_LINE:-}" ] && return
    [ "$__timetrace_at_prompt" = 1 ] || return
    [ "$BASH_COMMAND" = "__timetrace_precmd" ] && return
    __timetrace_at_prompt=0
    __timetrace_cmd=$BASH_COMMAND
    __timetrace_start=$EPOCHREALTIME
}

__timetrace_precmd() {
    local exit_status=$?
    if [ -n "${__timetrace_start:-}" ]; then
        command timetrace record \
            --started "$__timetrace_start" --finished "$EPOCHREALTIME" \
            --exit "$exit_status" --cwd "$PWD" \
            --command "$__timetrace_cmd" >/dev/null 2>&1
    fi
    __timetrace_start=
}

trap '__timetrace_preexec' DEBUG
PROMPT_COMMAND="__timetrace_precmd${PROMPT_COMMAND:+; $PROMPT_COMMAND}; __timetrace_at_prompt=1"
"#;

const ZSH: &str = r#"# timetrace shell integration for zsh
# Add to ~/.zshrc:
#   eval "$(timetrace init zsh)"

zmodload zsh/datetime
autoload -Uz add-zsh-hook

__timetrace_preexec() {
    __timetrace_cmd=$1
    __timetrace_start=$EPOCHREALTIME
}

__timetrace_precmd() {
    local exit_status=$?
    if [[ -n ${__timetrace_start-} ]]; then
        command timetrace record \
            --started "$__timetrace_start" --finished "$EPOCHREALTIME" \
            --exit "$exit_status" --cwd "$PWD" \
            --command "$__timetrace_cmd" >/dev/null 2>&1
    fi
    unset __timetrace_start
}

add-zsh-hook preexec __timetrace_preexec
add-zsh-hook precmd __timetrace_precmd
"#;

const POWERSHELL: &str = r#"# timetrace shell integration for PowerShell
# Add to $PROFILE:
#   Invoke-Expression (& timetrace init powershell | Out-String)

$global:__TimetraceLastId = (Get-History -Count 1).Id
$global:__TimetracePrompt = $function:prompt

function global:prompt {
    $exitCode = $global:LASTEXITCODE
    $entry = Get-History -Count 1
    if ($entry -and $entry.Id -ne $global:__TimetraceLastId) {
        $global:__TimetraceLastId = $entry.Id
        $recordArgs = @(
            'record',
            '--started', $entry.StartExecutionTime.ToUniversalTime().ToString('o'),
            '--finished', $entry.EndExecutionTime.ToUniversalTime().ToString('o'),
            '--cwd', (Get-Location).Path,
            '--command', $entry.CommandLine
        )
        if ($null -ne $exitCode) { $recordArgs += @('--exit', $exitCode) }
        try { & timetrace @recordArgs *> $null } catch { }
        $global:LASTEXITCODE = $exitCode
    }
    & $global:__TimetracePrompt
}
"#;

pub const fn script(shell: Shell) -> &'static str {
    match shell {
        Shell::Bash => BASH,
        Shell::Zsh => ZSH,
        Shell::Powershell => POWERSHELL,
    }
}

/// Runs the init command.
pub fn run<W: Write>(writer: &mut W, shell: Shell) -> Result<()> {
    write!(writer, "{}", script(shell))?;
    Ok(())
}
