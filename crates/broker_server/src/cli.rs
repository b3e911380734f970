/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Command Line Interface
use once_cell::sync::Lazy;

/// The parsed command-line arguments provided to this program. Lazily initialized.
///
/// # Exits
///
/// Exits if [`argh::from_env`] would exit--for example, if the `--help` flag was provided or the
/// program arguments could not be parsed.
pub static PARSED_COMMANDS: Lazy<TopLevel> = Lazy::new(argh::from_env);

/// Toplevel CLI commands and options.
/// Subcommands are optional.
/// If no command is provided "serve" will be invoked with default options.
#[derive(argh::FromArgs, PartialEq, Debug)]
pub struct TopLevel {
    /// subcommands
    #[argh(subcommand)]
    pub subcommand: Option<Command>,
}

/// Subcommands
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum Command {
    /// starts the broker.
    Serve(Serve),

    /// prints the broker version to stdout.
    Version(Version),

    /// generates the OpenAPI spec for the broker's HTTP surface.
    Oasgen(Oasgen),
}

/// Starts the broker. This is the default command when no command is provided.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "serve")]
pub struct Serve {
    /// if present, one or more `http://host:port` URIs to bind the server to.
    /// Defaults to `BROKER_PORT` on every interface if omitted.
    #[argh(option, short = 'b')]
    pub uri: Vec<String>,
}

impl Default for Serve {
    fn default() -> Serve {
        Serve { uri: Vec::default() }
    }
}

/// Prints the broker version to stdout.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "version")]
pub struct Version {}

/// Generates the OpenAPI spec for the broker's HTTP surface.
#[derive(argh::FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "oasgen")]
pub struct Oasgen {
    /// if present, generates the spec in yaml format; this is the default
    /// and can be omitted.
    #[argh(switch, short = 'y')]
    pub yaml: bool,
    /// if present, generates the spec in JSON format; the default is yaml.
    #[argh(switch, short = 'j')]
    pub json: bool,
}

#[cfg(test)]
#[rustfmt::skip]
mod test {
    use super::*;
    use argh::FromArgs;

    #[test]
    fn oasgen_defaults_to_no_format_flags() {
        assert_eq!(
            TopLevel::from_args(&["broker"], &["oasgen"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Oasgen(Oasgen {
                    yaml: false,
                    json: false,
                }))
            }
        );
    }

    #[test]
    fn version() {
        assert_eq!(
            TopLevel::from_args(&["broker"], &["version"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Version(Version{}))
            }
        );
    }

    #[test]
    fn serve_only() {
        assert_eq!(
            TopLevel::from_args(&["broker"], &["serve"]).expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Serve(Serve {
                    uri: [].to_vec(),
                }))
            }
        );
    }

    #[test]
    fn serve_one_uri() {
        assert_eq!(
            TopLevel::from_args(&["broker"], &["serve", "--uri", "http://localhost:3000"])
                .expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Serve(Serve {
                    uri: ["http://localhost:3000".to_string()].to_vec(),
                }))
            }
        );
    }

    #[test]
    fn serve_many_uris() {
        assert_eq!(
            TopLevel::from_args(
                &["broker"],
                &[
                    "serve",
                    "--uri", "http://localhost:3000",
                    "-b", "http://0.0.0.0:3001",
                ]
            )
            .expect("from_args failed"),
            TopLevel {
                subcommand: Some(Command::Serve(Serve {
                    uri: [
                        "http://localhost:3000",
                        "http://0.0.0.0:3001",
                    ]
                    .map(|x| x.to_string())
                    .to_vec(),
                }))
            }
        );
    }
}
