//! Fixed documentation blobs for the help verbs. Each prints to stdout
//! and the process exits 0.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP: &str = r#"tagsaw: partition large XML corpora and extract fields

USAGE
  tagsaw [global options] VERB ...

DOCUMENTATION
  -help       This summary
  -examples   Worked extraction examples
  -extras     Archive, posting, and phrase features
  -advanced   Exploration nesting and conditionals
  -internal   Pipeline and storage internals
  -sample     A small PubmedArticle test record
  -keys       Per-record index and hash line formats
  -unix       Companion shell idioms
  -version    Print version number

STREAMING VERBS
  -format copy|compact|flush|indent|expand
  -outline
  -synopsis
  -verify [Pattern]
  -filter Pattern ACTION OBJECT

EXTRACTION
  -pattern Pattern [exploration and extraction commands]

GLOBAL OPTIONS
  -proc N     worker threads          -input PATH   read from file
  -cons R     consumer ratio          -archive PATH record archive root
  -serv N     stasher threads         -index SPEC   identifier element
  -chan N     channel depth           -stash PATH   alias for -archive
  -heap N     reorder buffer target   -skip PATH    identifier skip list
  -farm N     node arena hint         -posting PATH posting trie root
  -gzip       compress stored records -phrase EXPR  record phrase filter
  -hash       print CRC32 lines       -config PATH  tagsaw.toml override
  -flag strict|mixed|none             -accent -ascii -compress -spaces
  -head/-tail STR  around the output  -hd/-tl STR   around each record
"#;

pub const EXAMPLES: &str = r##"EXTRACTION EXAMPLES

Element values, one row per record:

  tagsaw -pattern PubmedArticle -element MedlineCitation/PMID

Per-author columns inside each record:

  tagsaw -pattern PubmedArticle -element MedlineCitation/PMID \
    -block Author -sep " " -element Initials,LastName

Conditional on a feature count:

  tagsaw -pattern INSDSeq -if "#INSDFeature" -ge 3 \
    -element INSDSeq_accession-version

Variable capture and reuse:

  tagsaw -pattern PubmedArticle -ACC MedlineCitation/PMID \
    -block Author -pfc "\n" -element "&ACC" Initials,LastName

Sequence coordinate conversion:

  tagsaw -pattern INSDInterval -ucsc-based INSDInterval_from INSDInterval_to
"##;

pub const EXTRAS: &str = r#"ARCHIVE, POSTING, AND PHRASES

Store per-record files under a directory trie keyed by an identifier
element, gzip-compressed, with CRC32 report lines:

  tagsaw -archive /data/pm -index MedlineCitation/PMID \
    -pattern PubmedArticle -gzip -hash < corpus.xml

Retrieve records by identifier (one per line on stdin):

  echo 6301692 | tagsaw -archive /data/pm -gzip -fetch

Report stored-vs-incoming changes (NW new, UP updated, NO unchanged):

  tagsaw -archive /data/pm -index MedlineCitation/PMID \
    -prepare report -pattern PubmedArticle < update.xml

Keep only records whose content carries all phrase clauses:

  tagsaw -phrase "tn3 resolvase + plasmid" -pattern PubmedArticle ...

Append record UIDs to a per-term posting trie:

  tagsaw -posting /data/terms ... (one directory level per character)
"#;

pub const ADVANCED: &str = r#"EXPLORATION AND CONDITIONALS

Nesting levels, outermost first:

  -pattern > -division > -group > -branch > -block > -section > -subset > -unit

Visit paths take Parent/Match pairs; '*' matches any name, a leading ':'
matches any namespace prefix, and '**/Name' re-enters matched subtrees.

Conditions precede commands inside a block:

  -if X        require a match          -unless X   forbid a match
  -and Y       raise the requirement    -or Y       add an alternative
  -position first|last|N                (not combinable with -if)

Comparators: -equals -contains -starts-with -ends-with -is-not (string,
case folded) and -gt -ge -lt -le -eq -ne (integer). Prefix a right-hand
element with '#' (count), '%' (length), or '^' (depth).

Value commands: -element -first -last -num -len -depth -index -inc -dec
-sum -min -max -avg -sub -dev -encode -upper -lower -title -terms -words
-pairs -letters -indices. '$' lists child names, '@' attribute names,
'*' prints the subtree.

State commands: -pfx -sfx -sep -tab -ret -lbl -clr -pfc -rst -def, and
-NAME value stores a variable recalled later as "&NAME".
"#;

pub const INTERNAL: &str = r#"PIPELINE AND STORAGE INTERNALS

Stages run on OS threads joined by bounded channels sized to the worker
count. The producer carves records with a Boyer-Moore-Horspool scan and
labels each with a monotonic index; workers parse and execute per record;
a min-heap unshuffler restores input order before the sink.

Archive writes acquire a per-identifier entry in a mutex-guarded in-use
map before opening the file and release it after fsync. An older-index
writer retries once per second, five times; a newer-index holder makes
the write unnecessary and it is skipped.

Stored payloads are normalized first: pure-whitespace lines dropped,
<?xml?> preface lines stripped, single spaces adjacent to angle brackets
removed, LF terminators. CRC32-IEEE hashes cover the normalized bytes.
"#;

pub const SAMPLE: &str = r#"<PubmedArticle>
  <MedlineCitation>
    <PMID Version="1">6301692</PMID>
    <Article>
      <ArticleTitle>Site-specific relaxation and recombination by the
Tn3 resolvase.</ArticleTitle>
      <AuthorList>
        <Author>
          <LastName>Krasnow</LastName>
          <Initials>MA</Initials>
        </Author>
        <Author>
          <LastName>Cozzarelli</LastName>
          <Initials>NR</Initials>
        </Author>
      </AuthorList>
    </Article>
  </MedlineCitation>
</PubmedArticle>
"#;

pub const KEYS: &str = r#"LINE FORMATS

Record index lines (-index without -archive):

  identifier <TAB> record-number <TAB> byte-offset <TAB> byte-length

Hash lines (-hash):

  identifier <TAB> crc32-ieee-decimal

Archive layout:

  <root>/<trie-path>/<identifier>.xml[.gz]     e.g. NP_/06/00/51/NP_060051.2.xml

Posting layout:

  <root>/<c>/<h>/<a>/<r>/.../uids.txt          one UID per line
"#;

pub const UNIX: &str = r#"COMPANION IDIOMS

Count records:

  tagsaw -pattern PubmedArticle -element PMID < corpus.xml | wc -l

Sort a two-column extraction by the second column:

  ... | sort -t $'\t' -k2,2f

Fetch a batch of records in input order:

  sort -u uids.txt | tagsaw -archive /data/pm -fetch

Re-wrap extracted rows as XML:

  tagsaw -head "<Set>" -tail "</Set>" -hd "<Rec>" -tl "</Rec>" ...
"#;
