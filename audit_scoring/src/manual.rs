/*!

This is the long-form manual for `audit_scoring` and `storeaudit`.

## Input files

A run consumes one wave export per audit round plus two static
configuration files. All of them are semicolon-delimited CSV, UTF-8 with
a byte-order mark and a header row.

### Wave export

One row per shopper visit. The metadata columns are `Site Code`,
`Site Name`, `Branch`, `Regional` and `Final Score` (the external tool's
own composite, optional). Every question column embeds its numeric item
code in parentheses:

```text
(759220) Did the assistant offer the fitting room?
```

A sibling column with the same prefix and a `- Text` suffix holds the
shopper's free-text elaboration and is never scored. Columns named
`(Section) A. …` through `(Section) K. …` carry the external tool's own
section percentages; the engine recomputes sections from the raw items
and uses these columns only for the `--check-embedded` cross-check.

Raw answers are classified with the first matching rule:

1. empty cell: not counted
2. `yes` prefix (any case): positive
3. `no` prefix (any case): negative
4. `n/a` or `na`: not counted
5. embedded token `(1/1)` or `(1.00)`: positive; `(0/1)` or `(0.00)`:
   negative
6. an embedded decimal equal to 100: positive; equal to 0: negative
7. anything else (free text, partial fractions, mid-range percentages):
   not counted, and reported through the ambiguity counters

A section with no countable item is not applicable and never drags a
store down; the composite renormalizes over the weights of the sections
that were applicable.

### Master site directory

Columns `Site Code`, `Site Name`, `Region`, `Branch` and optionally
`City` and `Tier`. Stores missing from the directory fall back to the
identity columns of the wave row itself, normalized to trimmed
uppercase. A region or branch equal to `CLOSED` removes the store from
all aggregates.

### Section weight table

Two columns: the canonical section name (`A. Storefront Appearance`, …)
and an integer weight. The eleven weights must sum to exactly 100; the
run aborts otherwise, since a broken weight table invalidates every
composite.

## Run configuration

The `storeaudit` binary reads a JSON run configuration:

```json
{
    "outputSettings": {
        "programName": "Retail audit 2024",
        "outputDirectory": "out"
    },
    "masterFile": "CSV/master_sites.csv",
    "weightFile": "CSV/section_weights.csv",
    "waveFiles": [
        { "filePath": "CSV/wave_1_2024.csv", "waveName": "Wave 1", "year": 2024 },
        { "filePath": "CSV/wave_3_2024.csv", "waveName": "Wave 3", "year": 2024 }
    ]
}
```

Relative paths resolve against the configuration file's directory.

```bash
storeaudit --config run_config.json --out summary.json
```

`--reference previous_summary.json` compares the produced summary
against a reference file and fails on any difference, which makes a
re-run gate for refactorings. `--check-embedded` reports how closely
the recomputed section and composite scores reproduce the percentages
embedded in each export (0.1 point tolerance for a perfect match).

## Outputs

The JSON summary holds the per-wave national/region/branch averages and
every store's history. When an output directory is configured, the run
also writes `upserts.json`: idempotent upsert batches for the hosted
store, keyed by natural composite keys (site code + wave + section or
item), so re-ingesting a wave replaces rows instead of duplicating
them, together with the generated action plans and their blank
approval rows.

*/
