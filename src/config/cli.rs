//! Command-line parsing
//!
//! The CLI grammar is dash-less word pairs mixed with bare switches:
//!
//! ```text
//! kv-load host 10.0.0.1 clients 100 requests 50000 set 60 check quiet
//! ```
//!
//! Options that take a value consume the next token; anything
//! unrecognized (or a trailing option missing its value) is a usage
//! error.

/// Raw arguments as parsed from the token stream, before clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub host: String,
    pub port: u16,
    pub clients: u32,
    pub requests: u64,
    pub datasize_min: u64,
    pub datasize_max: u64,
    pub keyspace: u64,
    pub hashkeyspace: u64,
    pub set_perc: u32,
    pub del_perc: u32,
    pub lpush_perc: u32,
    pub lpop_perc: u32,
    pub hset_perc: u32,
    pub hget_perc: u32,
    pub hgetall_perc: u32,
    pub swapin_perc: u32,
    pub keepalive: bool,
    pub rand: bool,
    pub check: bool,
    pub longtail: bool,
    pub longtail_order: u32,
    pub quiet: bool,
    pub loop_forever: bool,
    pub idle: bool,
    pub debug: bool,
    pub seed: Option<u32>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            clients: 50,
            requests: 10_000,
            datasize_min: 1,
            datasize_max: 64,
            keyspace: 100_000,
            hashkeyspace: 1_000,
            set_perc: 50,
            del_perc: 0,
            lpush_perc: 0,
            lpop_perc: 0,
            hset_perc: 0,
            hget_perc: 0,
            hgetall_perc: 0,
            swapin_perc: 0,
            keepalive: true,
            rand: false,
            check: false,
            longtail: false,
            longtail_order: 6,
            quiet: false,
            loop_forever: false,
            idle: false,
            debug: false,
            seed: None,
        }
    }
}

/// Why parsing stopped without producing arguments.
#[derive(Debug, PartialEq, Eq)]
pub enum CliError {
    /// `help` was requested.
    Help,
    /// Unknown option, missing value, or out-of-range value. The
    /// message names the offending token.
    Invalid(String),
}

impl CliArgs {
    /// Parse a token stream (without the program name).
    pub fn parse_tokens<I>(tokens: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = Self::default();
        let mut iter = tokens.into_iter();

        fn value<I: Iterator<Item = String>>(
            opt: &str,
            iter: &mut I,
        ) -> Result<String, CliError> {
            iter.next()
                .ok_or_else(|| CliError::Invalid(format!("option '{}' requires a value", opt)))
        }

        fn num<T: std::str::FromStr>(opt: &str, raw: &str) -> Result<T, CliError> {
            raw.parse().map_err(|_| {
                CliError::Invalid(format!("invalid value '{}' for option '{}'", raw, opt))
            })
        }

        while let Some(tok) = iter.next() {
            match tok.as_str() {
                "host" => args.host = value(&tok, &mut iter)?,
                "port" => args.port = num(&tok, &value(&tok, &mut iter)?)?,
                "clients" => args.clients = num(&tok, &value(&tok, &mut iter)?)?,
                "requests" => args.requests = num(&tok, &value(&tok, &mut iter)?)?,
                "keepalive" => {
                    args.keepalive = num::<i64>(&tok, &value(&tok, &mut iter)?)? != 0;
                }
                "datasize" => {
                    let size = num(&tok, &value(&tok, &mut iter)?)?;
                    args.datasize_min = size;
                    args.datasize_max = size;
                }
                "mindatasize" => args.datasize_min = num(&tok, &value(&tok, &mut iter)?)?,
                "maxdatasize" => args.datasize_max = num(&tok, &value(&tok, &mut iter)?)?,
                "keyspace" => args.keyspace = num(&tok, &value(&tok, &mut iter)?)?,
                "hashkeyspace" => args.hashkeyspace = num(&tok, &value(&tok, &mut iter)?)?,
                "seed" => args.seed = Some(num(&tok, &value(&tok, &mut iter)?)?),
                "set" => args.set_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "del" => args.del_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "lpush" => args.lpush_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "lpop" => args.lpop_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "hset" => args.hset_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "hget" => args.hget_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "hgetall" => args.hgetall_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "swapin" => args.swapin_perc = num(&tok, &value(&tok, &mut iter)?)?,
                "longtailorder" => {
                    let order = num(&tok, &value(&tok, &mut iter)?)?;
                    if !(2..=100).contains(&order) {
                        return Err(CliError::Invalid(
                            "value out of range for 'longtailorder' option (2-100)".to_string(),
                        ));
                    }
                    args.longtail_order = order;
                }
                "big" => {
                    args.keyspace = 1_000_000;
                    args.requests = 1_000_000;
                }
                "verybig" => {
                    args.keyspace = 10_000_000;
                    args.requests = 10_000_000;
                }
                "rand" => args.rand = true,
                "check" => args.check = true,
                "longtail" => args.longtail = true,
                "quiet" => args.quiet = true,
                "loop" => args.loop_forever = true,
                "idle" => args.idle = true,
                "debug" => args.debug = true,
                "help" => return Err(CliError::Help),
                other => {
                    return Err(CliError::Invalid(format!("wrong option '{}'", other)));
                }
            }
        }

        Ok(args)
    }
}

/// Usage text, printed on `help` and on any misuse.
pub fn usage() -> &'static str {
    "\
Usage: kv-load ... options ...

 host <hostname>      Server hostname (default 127.0.0.1)
 port <port>          Server port (default 6379)
 clients <clients>    Number of parallel connections (default 50)
 requests <requests>  Total number of requests (default 10k)
 mindatasize <size>   Min data size of string values in bytes (default 1)
 maxdatasize <size>   Max data size of string values in bytes (default 64)
 datasize <size>      Set both min and max data size to the same value
 keepalive <0|1>      1=keep alive 0=reconnect (default 1)
 keyspace <keys>      The number of different keys to use (default 100k)
 hashkeyspace <keys>  The number of different hash fields to use (default 1k)
 rand                 Use random data payload (incompressible)
 check                Check integrity when reading data back (implies rand)
 longtail             Use long tail alike key access pattern distribution
 longtailorder <2-100>
                      A value of 2: 20% keys get 49% accesses.
                                 3: 20% keys get 59% accesses.
                                 4: 20% keys get 67% accesses.
                                 5: 20% keys get 74% accesses.
                                 6: 20% keys get 79% accesses (default).
                                 7: 20% keys get 83% accesses.
                                 8: 20% keys get 86% accesses.
                                 9: 20% keys get 89% accesses.
                                10: 20% keys get 91% accesses.
                                20: 20% keys get 99% accesses.
 seed <seed>          PRNG seed for deterministic load
 big                  alias for keyspace 1000000 requests 1000000
 verybig              alias for keyspace 10000000 requests 10000000
 quiet                Quiet mode, less verbose
 loop                 Loop. Run the tests forever
 idle                 Idle mode. Just open N idle connections and wait.
 debug                Debug mode. More verbose.
 help                 Show this help and exit

Type of operations (use percentages without trailing %):

 set <percentage>     Percentage of SETs (default 50)
 del <percentage>     Percentage of DELs (default 0)
 lpush <percentage>   Percentage of LPUSHs (default 0)
 lpop <percentage>    Percentage of LPOPs (default 0)
 hset <percentage>    Percentage of HSETs (default 0)
 hget <percentage>    Percentage of HGETs (default 0)
 hgetall <percentage> Percentage of HGETALLs (default 0)
 swapin <percentage>  Percentage of DEBUG SWAPINs (default 0)

 All the free percentage (in order to reach 100%) will be used for GETs
"
}
