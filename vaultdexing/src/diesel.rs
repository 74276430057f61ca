pub mod schema {
    diesel::table! {
      blocks (id) {
          id -> Int4,
          block_number -> Int8,
          block_hash -> VarChar,
          parent_hash -> VarChar,
          block_timestamp -> Int8,
          status -> VarChar,
      }
    }

    diesel::table! {
      vault_registry (id) {
          id -> Int4,
          address -> VarChar,
          deployed_at -> VarChar,
          last_block_indexed -> Nullable<VarChar>,
          last_block_processed -> Nullable<VarChar>,
      }
    }

    diesel::table! {
      events (id) {
          id -> Int4,
          transaction_hash -> VarChar,
          vault_address -> VarChar,
          block_number -> Int8,
          event_name -> VarChar,
          event_keys -> Json,
          event_data -> Json,
          event_count -> Int8,
          inserted_at -> Timestamptz,
      }
    }

    diesel::allow_tables_to_appear_in_same_query!(blocks, vault_registry, events,);
}
